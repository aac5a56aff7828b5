//! Chat-Verlauf – geordnete Nachrichtenliste mit Unread-Zaehler
//!
//! Jede empfangene Nachricht erhoeht entweder den Unread-Zaehler oder wird
//! bei geoeffnetem Chat sofort als gelesen betrachtet, nie beides und nie
//! keines von beiden. Eigene Nachrichten zaehlen nie als ungelesen.

use crate::types::ChatNachricht;

/// Append-only Nachrichtenliste einer Sitzung
#[derive(Debug, Clone, Default)]
pub struct ChatVerlauf {
    nachrichten: Vec<ChatNachricht>,
    ungelesen: usize,
    offen: bool,
}

impl ChatVerlauf {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt eine selbst gesendete Nachricht an
    pub fn eigene_hinzufuegen(&mut self, nachricht: ChatNachricht) {
        self.nachrichten.push(nachricht);
    }

    /// Haengt eine empfangene Nachricht an
    ///
    /// Gibt `true` zurueck, wenn der Unread-Zaehler erhoeht wurde.
    pub fn empfangene_hinzufuegen(&mut self, nachricht: ChatNachricht) -> bool {
        self.nachrichten.push(nachricht);
        if self.offen {
            false
        } else {
            self.ungelesen += 1;
            true
        }
    }

    /// Markiert die Chat-Oberflaeche als geoeffnet oder geschlossen
    ///
    /// Oeffnen setzt den Unread-Zaehler zurueck.
    pub fn chat_geoeffnet(&mut self, offen: bool) {
        self.offen = offen;
        if offen {
            self.ungelesen = 0;
        }
    }

    pub fn ist_offen(&self) -> bool {
        self.offen
    }

    pub fn ungelesen(&self) -> usize {
        self.ungelesen
    }

    pub fn nachrichten(&self) -> &[ChatNachricht] {
        &self.nachrichten
    }

    pub fn len(&self) -> usize {
        self.nachrichten.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nachrichten.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perspective_core::types::{PeerId, Rolle};

    fn nachricht(text: &str) -> ChatNachricht {
        ChatNachricht {
            id: text.to_string(),
            sender_id: PeerId::from("p1"),
            sender_role: Rolle::Peer,
            text: text.to_string(),
            timestamp: 1,
            encrypted: false,
            iv: None,
        }
    }

    #[test]
    fn empfang_bei_geschlossenem_chat_zaehlt() {
        let mut verlauf = ChatVerlauf::neu();
        assert!(verlauf.empfangene_hinzufuegen(nachricht("a")));
        assert!(verlauf.empfangene_hinzufuegen(nachricht("b")));
        assert_eq!(verlauf.ungelesen(), 2);
        assert_eq!(verlauf.len(), 2);
    }

    #[test]
    fn oeffnen_setzt_zaehler_zurueck() {
        let mut verlauf = ChatVerlauf::neu();
        verlauf.empfangene_hinzufuegen(nachricht("a"));
        verlauf.chat_geoeffnet(true);
        assert_eq!(verlauf.ungelesen(), 0);
        assert!(!verlauf.empfangene_hinzufuegen(nachricht("b")));
        assert_eq!(verlauf.ungelesen(), 0);

        verlauf.chat_geoeffnet(false);
        assert!(verlauf.empfangene_hinzufuegen(nachricht("c")));
        assert_eq!(verlauf.ungelesen(), 1);
    }

    #[test]
    fn eigene_nachrichten_zaehlen_nicht() {
        let mut verlauf = ChatVerlauf::neu();
        verlauf.eigene_hinzufuegen(nachricht("ich"));
        assert_eq!(verlauf.ungelesen(), 0);
        assert_eq!(verlauf.nachrichten()[0].text, "ich");
    }

    #[test]
    fn reihenfolge_bleibt_erhalten() {
        let mut verlauf = ChatVerlauf::neu();
        for t in ["eins", "zwei", "drei"] {
            verlauf.empfangene_hinzufuegen(nachricht(t));
        }
        let texte: Vec<&str> = verlauf.nachrichten().iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texte, vec!["eins", "zwei", "drei"]);
    }
}

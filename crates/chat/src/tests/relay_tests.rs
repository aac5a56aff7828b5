//! Unit-Tests fuer den ChatRelay

use std::sync::Arc;

use perspective_core::clock::{Clock, ManualClock};
use perspective_core::roster::Teilnehmerliste;
use perspective_core::types::{PeerId, Rolle};
use perspective_crypto::{ChatSchluessel, NachrichtenCodec};
use perspective_protocol::{ChatEnvelope, TransportFehler};

use super::test_transport::TestTransport;
use crate::{ChatError, ChatRelay, Empfang, VerwerfGrund};

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

fn host_id() -> PeerId {
    PeerId::from("host")
}

fn codec_mit(passwort: &str) -> NachrichtenCodec {
    NachrichtenCodec::mit_schluessel(ChatSchluessel::ableiten_mit(passwort, 1_000).unwrap())
}

struct HostAufbau {
    chat: ChatRelay,
    transport: Arc<TestTransport>,
    teilnehmer: Teilnehmerliste,
    uhr: ManualClock,
}

fn host_aufbauen(codec: NachrichtenCodec, zugelassen: &[&str]) -> HostAufbau {
    let transport = Arc::new(TestTransport::default());
    let teilnehmer = Teilnehmerliste::neu();
    for id in zugelassen {
        teilnehmer.hinzufuegen(PeerId::from(*id));
    }
    let uhr = ManualClock::neu(10_000);
    let uhr_dyn: Arc<dyn Clock> = Arc::new(uhr.clone());
    let chat = ChatRelay::host(
        host_id(),
        codec,
        transport.clone(),
        teilnehmer.clone(),
        uhr_dyn,
    );
    HostAufbau {
        chat,
        transport,
        teilnehmer,
        uhr,
    }
}

fn teilnehmer_aufbauen(id: &str, codec: NachrichtenCodec) -> (ChatRelay, Arc<TestTransport>) {
    let transport = Arc::new(TestTransport::default());
    let uhr: Arc<dyn Clock> = Arc::new(ManualClock::neu(20_000));
    let chat = ChatRelay::teilnehmer(PeerId::from(id), host_id(), codec, transport.clone(), uhr);
    (chat, transport)
}

fn klartext_envelope(sender: &str, text: &str, timestamp: u64) -> ChatEnvelope {
    ChatEnvelope {
        id: format!("id-{sender}-{timestamp}"),
        sender_id: PeerId::from(sender),
        sender_role: Rolle::Peer,
        text: text.to_string(),
        iv: None,
        timestamp,
        encrypted: false,
    }
}

// ---------------------------------------------------------------------------
// Senden
// ---------------------------------------------------------------------------

#[test]
fn test_host_sendet_an_alle_zugelassenen() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a", "b", "c"]);

    let nachricht = h.chat.senden("Hallo").unwrap();

    assert_eq!(nachricht.text, "Hallo");
    assert_eq!(nachricht.sender_role, Rolle::Host);
    assert_eq!(nachricht.timestamp, 10_000);
    assert_eq!(
        h.transport.empfaenger(),
        vec![PeerId::from("a"), PeerId::from("b"), PeerId::from("c")]
    );
    assert_eq!(h.chat.verlauf().len(), 1);
    assert_eq!(h.chat.ungelesen(), 0);
}

#[test]
fn test_nachricht_wird_getrimmt() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a"]);
    let nachricht = h.chat.senden("   Hallo Welt \n").unwrap();
    assert_eq!(nachricht.text, "Hallo Welt");
    assert_eq!(h.transport.chats()[0].1.text, "Hallo Welt");
}

#[test]
fn test_leere_nachricht_abgelehnt() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a"]);
    assert!(matches!(
        h.chat.senden("   "),
        Err(ChatError::UngueltigeEingabe(_))
    ));
    assert!(h.chat.verlauf().is_empty());
    assert!(h.transport.chats().is_empty());
}

#[test]
fn test_nachricht_laengengrenze() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a"]);

    let genau = "ä".repeat(128);
    assert!(h.chat.senden(&genau).is_ok());

    let zu_lang = "x".repeat(129);
    assert!(matches!(
        h.chat.senden(&zu_lang),
        Err(ChatError::ZuLang {
            laenge: 129,
            max: 128
        })
    ));
    assert_eq!(h.chat.verlauf().len(), 1);
}

#[test]
fn test_teilnehmer_sendet_nur_an_host() {
    let (mut chat, transport) = teilnehmer_aufbauen("a", NachrichtenCodec::klartext());
    chat.senden("an den Host").unwrap();

    let chats = transport.chats();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].0, host_id());
    assert_eq!(chats[0].1.sender_id, PeerId::from("a"));
    assert_eq!(chats[0].1.sender_role, Rolle::Peer);
}

#[test]
fn test_teilnehmer_ohne_verbindung_erhaelt_transportfehler() {
    let (mut chat, transport) = teilnehmer_aufbauen("a", NachrichtenCodec::klartext());
    transport.schliessen_markieren(&host_id());

    let ergebnis = chat.senden("niemand hoert zu");
    assert!(matches!(
        ergebnis,
        Err(ChatError::Transport(TransportFehler::Geschlossen(_)))
    ));
    assert!(chat.verlauf().is_empty());
}

#[test]
fn test_verschluesselte_nachricht_verlaesst_nie_klartext() {
    let (mut chat, transport) = teilnehmer_aufbauen("a", codec_mit("s3cret"));
    chat.senden("geheim").unwrap();

    let (_, envelope) = transport.chats().remove(0);
    assert!(envelope.encrypted);
    assert!(envelope.iv.is_some());
    assert_ne!(envelope.text, "geheim");
    assert_eq!(chat.verlauf().nachrichten()[0].text, "geheim");
}

// ---------------------------------------------------------------------------
// Empfangen und Weiterleiten
// ---------------------------------------------------------------------------

#[test]
fn test_host_leitet_an_alle_ausser_absender_weiter() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a", "b", "c"]);

    let ergebnis = h
        .chat
        .empfangen(&PeerId::from("a"), klartext_envelope("a", "hi", 10_500));

    assert_eq!(
        ergebnis,
        Empfang::Angezeigt {
            ungelesen_erhoeht: true,
            weitergeleitet: 2
        }
    );
    assert_eq!(
        h.transport.empfaenger(),
        vec![PeerId::from("b"), PeerId::from("c")]
    );
    assert_eq!(h.chat.verlauf().nachrichten()[0].text, "hi");
}

#[test]
fn test_host_leitet_original_envelope_weiter() {
    let mut h = host_aufbauen(codec_mit("s3cret"), &["a", "b"]);
    let (mut a, a_transport) = teilnehmer_aufbauen("a", codec_mit("s3cret"));
    h.uhr.setzen(1_000);

    a.senden("Hallo B").unwrap();
    let (_, original) = a_transport.chats().remove(0);

    let ergebnis = h.chat.empfangen(&PeerId::from("a"), original.clone());
    assert!(matches!(ergebnis, Empfang::Angezeigt { weitergeleitet: 1, .. }));

    let (empfaenger, weitergeleitet) = h.transport.chats().remove(0);
    assert_eq!(empfaenger, PeerId::from("b"));
    assert_eq!(weitergeleitet, original);
    assert_eq!(h.chat.verlauf().nachrichten()[0].text, "Hallo B");

    // B entschluesselt die weitergeleitete Nachricht
    let (mut b, _) = teilnehmer_aufbauen("b", codec_mit("s3cret"));
    let ergebnis = b.empfangen(&host_id(), weitergeleitet);
    assert!(matches!(ergebnis, Empfang::Angezeigt { weitergeleitet: 0, .. }));
    assert_eq!(b.verlauf().nachrichten()[0].text, "Hallo B");
}

#[test]
fn test_falscher_schluessel_wird_verworfen_und_nicht_weitergeleitet() {
    let mut h = host_aufbauen(codec_mit("richtig"), &["a", "b"]);
    let (mut a, a_transport) = teilnehmer_aufbauen("a", codec_mit("falsch"));
    h.uhr.setzen(1_000);

    a.senden("kaputt").unwrap();
    let (_, envelope) = a_transport.chats().remove(0);

    assert_eq!(
        h.chat.empfangen(&PeerId::from("a"), envelope),
        Empfang::Verworfen(VerwerfGrund::Entschluesselung)
    );
    assert!(h.transport.chats().is_empty());
    assert!(h.chat.verlauf().is_empty());
    assert_eq!(h.chat.ungelesen(), 0);
}

#[test]
fn test_verschluesselt_ohne_schluessel_wird_verworfen() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a"]);
    let mut envelope = klartext_envelope("a", "abcdef", 10_500);
    envelope.encrypted = true;
    envelope.iv = Some("00".repeat(12));

    assert_eq!(
        h.chat.empfangen(&PeerId::from("a"), envelope),
        Empfang::Verworfen(VerwerfGrund::Entschluesselung)
    );
}

#[test]
fn test_klartext_in_verschluesselter_sitzung_wird_angezeigt() {
    let mut h = host_aufbauen(codec_mit("s3cret"), &["a"]);
    let ergebnis = h
        .chat
        .empfangen(&PeerId::from("a"), klartext_envelope("a", "offen", 10_500));
    assert!(matches!(ergebnis, Empfang::Angezeigt { .. }));
    assert_eq!(h.chat.verlauf().nachrichten()[0].text, "offen");
}

#[test]
fn test_alte_nachricht_wird_verworfen() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a", "b"]);
    h.chat.verbindungszeitpunkt_setzen(10_000);

    assert_eq!(
        h.chat
            .empfangen(&PeerId::from("a"), klartext_envelope("a", "alt", 9_999)),
        Empfang::Verworfen(VerwerfGrund::Veraltet)
    );
    assert!(h.transport.chats().is_empty());

    // Gleicher Zeitstempel zaehlt nicht als alt
    assert!(matches!(
        h.chat
            .empfangen(&PeerId::from("a"), klartext_envelope("a", "neu", 10_000)),
        Empfang::Angezeigt { .. }
    ));
}

#[test]
fn test_nicht_zugelassener_absender_wird_verworfen() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a"]);
    assert_eq!(
        h.chat
            .empfangen(&PeerId::from("x"), klartext_envelope("x", "hallo", 10_500)),
        Empfang::Verworfen(VerwerfGrund::NichtZugelassen)
    );

    h.teilnehmer.entfernen(&PeerId::from("a"));
    assert_eq!(
        h.chat
            .empfangen(&PeerId::from("a"), klartext_envelope("a", "weg", 10_500)),
        Empfang::Verworfen(VerwerfGrund::NichtZugelassen)
    );
}

#[test]
fn test_gefaelschter_absender_wird_verworfen() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a", "b"]);
    assert_eq!(
        h.chat
            .empfangen(&PeerId::from("a"), klartext_envelope("b", "ich bin b", 10_500)),
        Empfang::Verworfen(VerwerfGrund::UngueltigerAbsender)
    );

    let mut als_host = klartext_envelope("a", "ich bin host", 10_500);
    als_host.sender_role = Rolle::Host;
    assert_eq!(
        h.chat.empfangen(&PeerId::from("a"), als_host),
        Empfang::Verworfen(VerwerfGrund::UngueltigerAbsender)
    );
}

#[test]
fn test_teilnehmer_akzeptiert_nur_vom_host() {
    let (mut chat, transport) = teilnehmer_aufbauen("a", NachrichtenCodec::klartext());
    assert_eq!(
        chat.empfangen(&PeerId::from("b"), klartext_envelope("b", "direkt", 30_000)),
        Empfang::Verworfen(VerwerfGrund::UngueltigerAbsender)
    );
    assert!(matches!(
        chat.empfangen(&host_id(), klartext_envelope("b", "ueber host", 30_000)),
        Empfang::Angezeigt { weitergeleitet: 0, .. }
    ));
    assert!(transport.chats().is_empty());
}

#[test]
fn test_ueberlanger_text_wird_verworfen() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a"]);
    let envelope = klartext_envelope("a", &"x".repeat(129), 10_500);
    assert_eq!(
        h.chat.empfangen(&PeerId::from("a"), envelope),
        Empfang::Verworfen(VerwerfGrund::UngueltigerInhalt)
    );
}

// ---------------------------------------------------------------------------
// Unread-Zaehler
// ---------------------------------------------------------------------------

#[test]
fn test_unread_zaehler_und_geoeffneter_chat() {
    let mut h = host_aufbauen(NachrichtenCodec::klartext(), &["a"]);

    h.chat
        .empfangen(&PeerId::from("a"), klartext_envelope("a", "eins", 10_001));
    h.chat
        .empfangen(&PeerId::from("a"), klartext_envelope("a", "zwei", 10_002));
    assert_eq!(h.chat.ungelesen(), 2);

    h.chat.chat_geoeffnet(true);
    assert_eq!(h.chat.ungelesen(), 0);

    let ergebnis = h
        .chat
        .empfangen(&PeerId::from("a"), klartext_envelope("a", "drei", 10_003));
    assert!(matches!(
        ergebnis,
        Empfang::Angezeigt {
            ungelesen_erhoeht: false,
            ..
        }
    ));

    h.chat.chat_geoeffnet(false);
    h.chat.senden("eigene").unwrap();
    assert_eq!(h.chat.ungelesen(), 0);
    assert_eq!(h.chat.verlauf().len(), 4);
}

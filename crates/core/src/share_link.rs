//! Freigabe-Links – Erzeugen und Pruefen von Beitritts-URLs
//!
//! Format: `https://host.example/#/share?peer=<peer-id>`
//!
//! ## Pruefregeln
//! 1. Origin (Schema, Host, Port) muss exakt mit dem erwarteten Origin uebereinstimmen
//! 2. Hash-Routing muss mit `#/share` beginnen
//! 3. Parameter `peer` muss vorhanden und nicht leer sein

use thiserror::Error;

use crate::types::PeerId;

/// Pfad der Freigabe-Route innerhalb des Hash-Fragments
pub const SHARE_ROUTE: &str = "#/share";

/// Fehler bei der Pruefung eines Freigabe-Links
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkFehler {
    #[error("Link gehoert zu einer anderen Instanz")]
    DomainMismatch,

    #[error("Ungueltiges Link-Format")]
    UngueltigesFormat,

    #[error("Link enthaelt keine Sitzungs-Kennung")]
    PeerIdFehlt,

    #[error("Link ist keine gueltige URL")]
    FehlerhafteUrl,
}

/// Erzeugt den Freigabe-Link fuer eine Host-Kennung
///
/// Die Basis wird ohne Fragment uebernommen; ein abschliessender `/`
/// wird ergaenzt.
pub fn share_link_erzeugen(basis: &str, host: &PeerId) -> String {
    let ohne_fragment = basis.split('#').next().unwrap_or(basis);
    let trenner = if ohne_fragment.ends_with('/') { "" } else { "/" };
    format!(
        "{ohne_fragment}{trenner}{SHARE_ROUTE}?peer={}",
        prozent_kodieren(host.as_str())
    )
}

/// Prueft einen Freigabe-Link und liefert die enthaltene Host-Kennung
pub fn share_link_validieren(url: &str, erwarteter_origin: &str) -> Result<PeerId, LinkFehler> {
    let origin = origin_von(url.trim()).ok_or(LinkFehler::FehlerhafteUrl)?;
    let erwartet = origin_von(erwarteter_origin).ok_or(LinkFehler::FehlerhafteUrl)?;
    if origin != erwartet {
        return Err(LinkFehler::DomainMismatch);
    }

    let fragment = url
        .trim()
        .find('#')
        .map(|pos| &url.trim()[pos..])
        .ok_or(LinkFehler::UngueltigesFormat)?;
    if !fragment.starts_with(SHARE_ROUTE) {
        return Err(LinkFehler::UngueltigesFormat);
    }

    let query = fragment.split_once('?').map(|(_, q)| q).unwrap_or("");
    let peer = query
        .split('&')
        .filter_map(|paar| paar.split_once('='))
        .find(|(name, _)| *name == "peer")
        .map(|(_, wert)| prozent_dekodieren(wert))
        .transpose()
        .map_err(|_| LinkFehler::FehlerhafteUrl)?
        .map(|wert| wert.trim().to_string())
        .filter(|wert| !wert.is_empty())
        .ok_or(LinkFehler::PeerIdFehlt)?;

    Ok(PeerId::aus_string(peer))
}

/// Normalisierter Origin `schema://host[:port]` (Standard-Ports entfallen)
fn origin_von(url: &str) -> Option<String> {
    let (schema, rest) = url.split_once("://")?;
    if schema.is_empty()
        || !schema
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    let schema = schema.to_ascii_lowercase();

    let autoritaet_ende = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let autoritaet = &rest[..autoritaet_ende];
    let host_port = autoritaet.rsplit('@').next().unwrap_or(autoritaet);
    if host_port.is_empty() {
        return None;
    }

    // IPv6-Literale: [::1]:8080
    let (host, port_text) = if host_port.starts_with('[') {
        let ende = host_port.find(']')?;
        let nach = &host_port[ende + 1..];
        (&host_port[..=ende], nach.strip_prefix(':'))
    } else {
        match host_port.rsplit_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (host_port, None),
        }
    };
    let port = match port_text {
        Some(p) if !p.is_empty() => Some(p.parse::<u16>().ok()?),
        _ => None,
    };
    if host.is_empty() {
        return None;
    }

    let standard_port = match schema.as_str() {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    };
    let host = host.to_ascii_lowercase();
    Some(match port {
        Some(p) if Some(p) != standard_port => format!("{schema}://{host}:{p}"),
        _ => format!("{schema}://{host}"),
    })
}

/// Kodiert wie `encodeURIComponent`
fn prozent_kodieren(wert: &str) -> String {
    let mut aus = String::with_capacity(wert.len());
    for byte in wert.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => aus.push(byte as char),
            _ => aus.push_str(&format!("%{byte:02X}")),
        }
    }
    aus
}

fn prozent_dekodieren(wert: &str) -> Result<String, ()> {
    let bytes = wert.as_bytes();
    let mut aus = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3).ok_or(())?;
                let hex = std::str::from_utf8(hex).map_err(|_| ())?;
                aus.push(u8::from_str_radix(hex, 16).map_err(|_| ())?);
                i += 3;
            }
            b'+' => {
                aus.push(b' ');
                i += 1;
            }
            b => {
                aus.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(aus).map_err(|_| ())
}

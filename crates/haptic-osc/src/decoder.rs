//! OSC packet decoding.
//!
//! A datagram holds either a single message or a bundle. Bundles (including
//! nested ones) are flattened into their messages in wire order. Each message
//! is then matched against the REAPER address table.
//!
//! Argument decoding never fails: a missing or unusable first argument yields
//! the payload default (`0.0` peak, marker `0`).

use rosc::{OscMessage, OscPacket, OscType};

use haptic_core::events::REAPER_PREFIX;
use haptic_core::{DomainEvent, EventKind, HapticError, Result};

/// Result of matching one message against the address table.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(DomainEvent),
    /// Under `/reaper/` but not a known address.
    Unhandled(String),
    /// Outside the `/reaper/` namespace.
    Ignored,
}

/// Decode a raw datagram into its messages, in order.
pub fn decode_datagram(bytes: &[u8]) -> Result<Vec<OscMessage>> {
    let (_, packet) =
        rosc::decoder::decode_udp(bytes).map_err(|e| HapticError::Decode(format!("{:?}", e)))?;
    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}

/// Map one message to a domain event.
pub fn decode_message(message: &OscMessage) -> Decoded {
    let address = message.addr.as_str();
    tracing::trace!(address, args = message.args.len(), "OSC received");

    match EventKind::from_address(address) {
        Some(EventKind::Clip) => Decoded::Event(DomainEvent::clip(peak_db(&message.args))),
        Some(EventKind::MarkerCrossed) => {
            Decoded::Event(DomainEvent::marker(marker_index(&message.args)))
        }
        Some(kind) => Decoded::Event(DomainEvent::new(kind)),
        None if address.starts_with(REAPER_PREFIX) => Decoded::Unhandled(address.to_string()),
        None => Decoded::Ignored,
    }
}

fn peak_db(args: &[OscType]) -> f32 {
    match args.first() {
        None => 0.0,
        Some(OscType::Float(v)) => *v,
        Some(OscType::Double(v)) => *v as f32,
        Some(OscType::Int(v)) => *v as f32,
        Some(OscType::Long(v)) => *v as f32,
        Some(OscType::String(s)) => s.trim().parse().unwrap_or_else(|_| {
            tracing::debug!(value = %s, "Clip level is not numeric, using 0.0");
            0.0
        }),
        Some(other) => {
            tracing::debug!(arg = ?other, "Unexpected clip argument type, using 0.0");
            0.0
        }
    }
}

fn marker_index(args: &[OscType]) -> i32 {
    let index = match args.first() {
        None => Some(0),
        Some(OscType::Int(v)) => Some(*v),
        Some(OscType::Long(v)) => i32::try_from(*v).ok(),
        Some(OscType::Float(v)) => float_to_index(f64::from(*v)),
        Some(OscType::Double(v)) => float_to_index(*v),
        Some(OscType::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    };
    index.unwrap_or_else(|| {
        tracing::debug!(args = ?args, "Unusable marker argument, using 0");
        0
    })
}

fn float_to_index(v: f64) -> Option<i32> {
    let rounded = v.round();
    if rounded.is_finite() && rounded >= f64::from(i32::MIN) && rounded <= f64::from(i32::MAX) {
        Some(rounded as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haptic_core::EventPayload;
    use rosc::{OscBundle, OscTime};

    fn msg(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    fn bundle(content: Vec<OscPacket>) -> OscPacket {
        OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content,
        })
    }

    fn encode(packet: &OscPacket) -> Vec<u8> {
        rosc::encoder::encode(packet).unwrap()
    }

    #[test]
    fn test_decode_every_address() {
        for kind in EventKind::ALL {
            match decode_message(&msg(kind.address(), vec![])) {
                Decoded::Event(event) => assert_eq!(event.kind, kind),
                other => panic!("{} decoded as {:?}", kind.address(), other),
            }
        }
    }

    #[test]
    fn test_clip_without_args_defaults_to_zero() {
        assert_eq!(
            decode_message(&msg("/reaper/clip", vec![])),
            Decoded::Event(DomainEvent::clip(0.0))
        );
    }

    #[test]
    fn test_clip_numeric_argument_types() {
        let cases = vec![
            (OscType::Float(1.5), 1.5),
            (OscType::Double(-3.0), -3.0),
            (OscType::Int(2), 2.0),
            (OscType::Long(4), 4.0),
            (OscType::String(" 0.5 ".to_string()), 0.5),
            (OscType::String("loud".to_string()), 0.0),
            (OscType::Bool(true), 0.0),
            (OscType::Nil, 0.0),
        ];
        for (arg, expected) in cases {
            let decoded = decode_message(&msg("/reaper/clip", vec![arg.clone()]));
            assert_eq!(
                decoded,
                Decoded::Event(DomainEvent::clip(expected)),
                "arg {:?}",
                arg
            );
        }
    }

    #[test]
    fn test_marker_argument_types() {
        let cases = vec![
            (vec![], 0),
            (vec![OscType::Int(7)], 7),
            (vec![OscType::Long(12)], 12),
            (vec![OscType::Long(i64::MAX)], 0),
            (vec![OscType::Float(2.6)], 3),
            (vec![OscType::Double(f64::NAN)], 0),
            (vec![OscType::String("5".to_string())], 5),
            (vec![OscType::String("intro".to_string())], 0),
            (vec![OscType::Blob(vec![1, 2])], 0),
        ];
        for (args, expected) in cases {
            match decode_message(&msg("/reaper/marker", args.clone())) {
                Decoded::Event(event) => {
                    assert_eq!(event.payload, EventPayload::MarkerIndex(expected), "{:?}", args)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_payload_ignored_for_plain_kinds() {
        assert_eq!(
            decode_message(&msg("/reaper/snap", vec![OscType::Int(1)])),
            Decoded::Event(DomainEvent::new(EventKind::Snap))
        );
    }

    #[test]
    fn test_unknown_reaper_address_is_unhandled() {
        assert_eq!(
            decode_message(&msg("/reaper/tempo", vec![])),
            Decoded::Unhandled("/reaper/tempo".to_string())
        );
        assert_eq!(
            decode_message(&msg("/reaper/record", vec![])),
            Decoded::Unhandled("/reaper/record".to_string())
        );
    }

    #[test]
    fn test_foreign_address_is_ignored() {
        assert_eq!(decode_message(&msg("/track/1/volume", vec![])), Decoded::Ignored);
        assert_eq!(decode_message(&msg("/reaper", vec![])), Decoded::Ignored);
    }

    #[test]
    fn test_decode_single_message_datagram() {
        let bytes = encode(&OscPacket::Message(msg("/reaper/align", vec![])));
        let messages = decode_datagram(&bytes).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].addr, "/reaper/align");
    }

    #[test]
    fn test_decode_bundle_preserves_order() {
        let packet = bundle(vec![
            OscPacket::Message(msg("/reaper/snap", vec![])),
            OscPacket::Message(msg("/reaper/clip", vec![OscType::Float(0.2)])),
            OscPacket::Message(msg("/reaper/align", vec![])),
        ]);
        let messages = decode_datagram(&encode(&packet)).unwrap();
        let kinds: Vec<Decoded> = messages.iter().map(decode_message).collect();
        assert_eq!(
            kinds,
            vec![
                Decoded::Event(DomainEvent::new(EventKind::Snap)),
                Decoded::Event(DomainEvent::clip(0.2)),
                Decoded::Event(DomainEvent::new(EventKind::ItemAligned)),
            ]
        );
    }

    #[test]
    fn test_decode_nested_bundle() {
        let packet = bundle(vec![
            OscPacket::Message(msg("/reaper/play/start", vec![])),
            bundle(vec![
                OscPacket::Message(msg("/reaper/marker", vec![OscType::Int(2)])),
                OscPacket::Message(msg("/reaper/play/stop", vec![])),
            ]),
            OscPacket::Message(msg("/reaper/render/complete", vec![])),
        ]);
        let addrs: Vec<String> = decode_datagram(&encode(&packet))
            .unwrap()
            .into_iter()
            .map(|m| m.addr)
            .collect();
        assert_eq!(
            addrs,
            vec![
                "/reaper/play/start",
                "/reaper/marker",
                "/reaper/play/stop",
                "/reaper/render/complete",
            ]
        );
    }

    #[test]
    fn test_malformed_datagram_is_decode_error() {
        let result = decode_datagram(b"not an osc packet");
        assert!(matches!(result, Err(HapticError::Decode(_))));
    }
}

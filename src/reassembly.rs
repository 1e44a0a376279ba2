//! Grouping decoded PDUs into user-visible messages.
//!
//! A single SMS longer than one PDU's worth of septets/UCS-2 units arrives as
//! several `PduRecord`s sharing a concatenation UDH element. This module
//! groups those back together; see DESIGN.md for the incomplete-group policy.

use std::collections::HashMap;

use log::warn;

use crate::pdu::PduRecord;

/// A reassembled, user-visible message, ready for exclusion filtering and
/// delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRecord {
    pub from_number: String,
    pub timestamp: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    sender: String,
    reference: u16,
    total: u8,
}

/// Partition `records` by presence of a concatenation UDH element, emit
/// standalone records as-is, and reassemble concatenated groups in `seq`
/// order. Groups missing segments (`total` greater than the number of
/// distinct `seq` values observed) are dropped rather than emitted with a
/// gap; see the Open Question decision in DESIGN.md.
pub fn build_sms_list(records: &[PduRecord]) -> Vec<SmsRecord> {
    let mut standalone = Vec::new();
    let mut groups: HashMap<GroupKey, Vec<&PduRecord>> = HashMap::new();

    for record in records {
        match record.concat_key() {
            Some(key) => {
                groups
                    .entry(GroupKey {
                        sender: record.sender.clone(),
                        reference: key.reference,
                        total: key.total,
                    })
                    .or_default()
                    .push(record);
            }
            None => standalone.push(SmsRecord {
                from_number: record.sender.clone(),
                timestamp: record.timestamp.clone(),
                message: record.body.clone(),
            }),
        }
    }

    let mut out = standalone;
    for (key, mut parts) in groups {
        parts.sort_by_key(|r| r.concat_key().expect("grouped by concat_key").seq);

        let mut seqs: Vec<u8> = parts
            .iter()
            .map(|r| r.concat_key().expect("grouped by concat_key").seq)
            .collect();
        seqs.dedup();

        if seqs.len() < key.total as usize {
            warn!(
                "dropping incomplete concatenated group from {} (reference={}, total={}, have seq {:?})",
                key.sender, key.reference, key.total, seqs
            );
            continue;
        }

        let message = parts.iter().map(|r| r.body.as_str()).collect::<String>();
        let last = parts.last().expect("group is non-empty");
        out.push(SmsRecord {
            from_number: last.sender.clone(),
            timestamp: last.timestamp.clone(),
            message,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{ConcatKey, PduRecord, UserDataElement};

    fn concat_record(seq: u8, total: u8, iei: u8, body: &str, timestamp: &str) -> PduRecord {
        let ied = if iei == 0x00 {
            vec![0x01, total, seq]
        } else {
            vec![0x00, 0x01, total, seq]
        };
        PduRecord {
            smsc: None,
            msg_type_flags: 0x40,
            sender: "09012345678".into(),
            tp_pid: 0,
            tp_dcs: 0,
            timestamp: timestamp.into(),
            udh: Some(vec![UserDataElement { iei, ied }]),
            body: body.into(),
        }
    }

    fn standalone_record(sender: &str, body: &str) -> PduRecord {
        PduRecord {
            smsc: None,
            msg_type_flags: 0x04,
            sender: sender.into(),
            tp_pid: 0,
            tp_dcs: 0,
            timestamp: "2022-09-28 11:20:55".into(),
            udh: None,
            body: body.into(),
        }
    }

    #[test]
    fn standalone_records_pass_through() {
        let records = vec![standalone_record("0", "hello")];
        let sms = build_sms_list(&records);
        assert_eq!(sms.len(), 1);
        assert_eq!(sms[0].from_number, "0");
        assert_eq!(sms[0].message, "hello");
    }

    #[test]
    fn complete_group_reassembles_in_seq_order_with_last_segment_metadata() {
        let records = vec![
            concat_record(1, 2, 0x08, "Hello, ", "2022-09-27 10:53:05"),
            concat_record(2, 2, 0x08, "world", "2022-09-27 10:53:06"),
        ];
        let sms = build_sms_list(&records);
        assert_eq!(sms.len(), 1);
        assert_eq!(sms[0].message, "Hello, world");
        assert_eq!(sms[0].timestamp, "2022-09-27 10:53:06");
    }

    #[test]
    fn out_of_order_segments_are_sorted_before_concatenation() {
        let records = vec![
            concat_record(2, 2, 0x00, "world", "2022-09-27 10:53:06"),
            concat_record(1, 2, 0x00, "Hello, ", "2022-09-27 10:53:05"),
        ];
        let sms = build_sms_list(&records);
        assert_eq!(sms.len(), 1);
        assert_eq!(sms[0].message, "Hello, world");
    }

    #[test]
    fn incomplete_group_is_dropped() {
        let records = vec![concat_record(1, 3, 0x00, "Hello, ", "2022-09-27 10:53:05")];
        let sms = build_sms_list(&records);
        assert!(sms.is_empty());
    }

    #[test]
    fn build_sms_list_is_idempotent_up_to_group_ordering() {
        let records = vec![
            standalone_record("1", "a"),
            concat_record(1, 2, 0x08, "b", "2022-09-27 10:53:05"),
            concat_record(2, 2, 0x08, "c", "2022-09-27 10:53:06"),
        ];
        let mut first = build_sms_list(&records);
        let mut second = build_sms_list(&records);
        first.sort_by(|a, b| a.from_number.cmp(&b.from_number).then(a.message.cmp(&b.message)));
        second.sort_by(|a, b| a.from_number.cmp(&b.from_number).then(a.message.cmp(&b.message)));
        assert_eq!(first, second);
    }

    #[test]
    fn seed_scenario_2_concatenated_ucs2_segments_reassemble() {
        use crate::pdu::parse_pdu;

        // All three segments of a Japanese UCS-2 message, sharing UDH
        // reference 0xDCEB (iei=0x08, total=3). The fixture's own UDH
        // reports total=3, so reassembling only the first two (as the spec
        // prose's seed scenario abbreviates it) would be an incomplete
        // group and get dropped; all three are needed for a real complete
        // group. Ground truth traced against the original decoder: every
        // segment carries the same TP-SCTS, so the reassembled timestamp is
        // "2022-09-27 10:53:30", not the "10:53:06" the prose states.
        let part1 = "0891180945123481F44012D04E2A15447C0E9FCD270008229072013503638B060804DCEB0301301030C930B330E2304B3089306E304A77E53089305B3011000D000A672C30E130FC30EB306F682A5F0F4F1A793E004E0054005430C930B330E2304B3089901A4FE16599712165993067914D4FE1305730663044307E30593002000D000A000D000A30C930B330E2304B3089306E91CD8981306A304A77E53089305B3084006430DD30A4";
        let part2 = "0891180945123481F44012D04E2A15447C0E9FCD270008229072013503638B060804DCEB030230F330C830923054522975283044305F3060304F305F3081306B306F521D671F8A2D5B9A304C5FC589813068306A308A307E30593002000D000A4EE54E0B306E00550052004C306E51855BB9306B5F933063306630C930B330E230B530FC30D330B9306E8A2D5B9A3092304A985830443044305F3057307E30593002FF08901A4FE16599";
        let part3 = "0891180945123481F44412D04E2A15447C0E9FCD2700082290720135036381060804DCEB030367096599FF09000D000A0068007400740070003A002F002F0073006500720076006900630065002E0073006D0074002E0064006F0063006F006D006F002E006E0065002E006A0070002F0073006900740065002F006D00610069006C002F007300720063002F00630063006E002E00680074006D006C000D000A";

        let records = vec![
            parse_pdu(part1).expect("segment 1 must decode"),
            parse_pdu(part2).expect("segment 2 must decode"),
            parse_pdu(part3).expect("segment 3 must decode"),
        ];
        assert_eq!(records[0].sender, "e4a25144c7e09dc72");
        assert_eq!(records[0].concat_key().map(|k| (k.reference, k.total, k.seq)), Some((0xDCEB, 3, 1)));
        assert_eq!(records[1].concat_key().map(|k| (k.reference, k.total, k.seq)), Some((0xDCEB, 3, 2)));
        assert_eq!(records[2].concat_key().map(|k| (k.reference, k.total, k.seq)), Some((0xDCEB, 3, 3)));

        let sms = build_sms_list(&records);
        assert_eq!(sms.len(), 1);
        assert_eq!(sms[0].from_number, "e4a25144c7e09dc72");
        assert_eq!(sms[0].timestamp, "2022-09-27 10:53:30");
        assert!(sms[0].message.starts_with("【ドコモからのお知らせ】"));
        assert!(sms[0].message.ends_with("src/ccn.html\r\n"));
        assert!(sms[0].message.contains("お知らせやdポイント"));
    }

    #[test]
    fn seed_scenario_2_incomplete_pair_is_dropped() {
        use crate::pdu::parse_pdu;

        // Only segments 1 and 2 of the same three-part message: the UDH's
        // own total=3 makes this an incomplete group, so it is dropped
        // rather than reassembled into a two-part message.
        let part1 = "0891180945123481F44012D04E2A15447C0E9FCD270008229072013503638B060804DCEB0301301030C930B330E2304B3089306E304A77E53089305B3011000D000A672C30E130FC30EB306F682A5F0F4F1A793E004E0054005430C930B330E2304B3089901A4FE16599712165993067914D4FE1305730663044307E30593002000D000A000D000A30C930B330E2304B3089306E91CD8981306A304A77E53089305B3084006430DD30A4";
        let part2 = "0891180945123481F44012D04E2A15447C0E9FCD270008229072013503638B060804DCEB030230F330C830923054522975283044305F3060304F305F3081306B306F521D671F8A2D5B9A304C5FC589813068306A308A307E30593002000D000A4EE54E0B306E00550052004C306E51855BB9306B5F933063306630C930B330E230B530FC30D330B9306E8A2D5B9A3092304A985830443044305F3057307E30593002FF08901A4FE16599";

        let records = vec![
            parse_pdu(part1).expect("segment 1 must decode"),
            parse_pdu(part2).expect("segment 2 must decode"),
        ];
        assert!(build_sms_list(&records).is_empty());
    }

    #[test]
    fn different_senders_with_same_reference_do_not_merge() {
        let mut a = concat_record(1, 2, 0x00, "x", "2022-09-27 10:53:05");
        a.sender = "111".into();
        let mut b = concat_record(2, 2, 0x00, "y", "2022-09-27 10:53:06");
        b.sender = "222".into();
        let sms = build_sms_list(&[a, b]);
        assert_eq!(sms.len(), 0); // each is now an incomplete group of its own
    }
}

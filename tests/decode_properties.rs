//! Property tests for record and master sector decoding

mod common;

use common::*;
use hik_drill::decode::records::{RECORD_STRIDE, UNSET_END_TIME, UNSET_START_TIME};
use hik_drill::decode::{DecodeOptions, Decoder, DEFAULT_VIDEO_TIME_OFFSET_SECS};
use hik_drill::{AllocationState, Channel, MasterSector, VideoRecord, VideoTime};
use proptest::prelude::*;

fn slot_bytes(marker: [u8; 8], channel: u32, start: u32, end: u32, block: u64) -> Vec<u8> {
    let mut data = vec![0u8; RECORD_STRIDE as usize];
    data[0..8].copy_from_slice(&marker);
    data[9..13].copy_from_slice(&channel.to_le_bytes());
    data[16..20].copy_from_slice(&start.to_le_bytes());
    data[20..24].copy_from_slice(&end.to_le_bytes());
    data[24..32].copy_from_slice(&block.to_le_bytes());
    data
}

proptest! {
    #[test]
    fn allocation_states_are_disjoint(marker in any::<[u8; 8]>()) {
        let state = AllocationState::from_marker(marker);
        match state {
            AllocationState::Allocated => prop_assert_eq!(marker, [0u8; 8]),
            AllocationState::Unallocated => prop_assert_eq!(marker, [0xFFu8; 8]),
            AllocationState::Unknown(raw) => {
                prop_assert_eq!(raw, marker);
                prop_assert!(marker != [0u8; 8] && marker != [0xFFu8; 8]);
            }
        }
    }

    #[test]
    fn channel_never_fabricated(raw in any::<u32>()) {
        match Channel::from_raw(raw) {
            Channel::Valid(n) => {
                prop_assert_eq!(n, raw);
                prop_assert!(raw <= 256);
            }
            Channel::Invalid(n) => {
                prop_assert_eq!(n, raw);
                prop_assert!(raw > 256);
            }
        }
    }

    #[test]
    fn unset_start_wins_over_other_fields(
        marker in any::<[u8; 8]>(),
        channel in any::<u32>(),
        end in any::<u32>(),
        block in any::<u64>(),
    ) {
        let data = slot_bytes(marker, channel, UNSET_START_TIME, end, block);
        let rec = VideoRecord::decode(&data, 0, 0, 0, DEFAULT_VIDEO_TIME_OFFSET_SECS);
        prop_assert_eq!(rec.start_time, VideoTime::Unset);
        prop_assert_eq!(rec.block_address, block);
    }

    #[test]
    fn non_sentinel_times_are_shifted(raw in any::<u32>()) {
        prop_assume!(raw != UNSET_START_TIME && raw != UNSET_END_TIME);
        let start = VideoTime::decode(raw, UNSET_START_TIME, DEFAULT_VIDEO_TIME_OFFSET_SECS);
        match start {
            VideoTime::At(t) => prop_assert_eq!(t.timestamp(), i64::from(raw) - 10_800),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
        let end = VideoTime::decode(raw, UNSET_END_TIME, DEFAULT_VIDEO_TIME_OFFSET_SECS);
        prop_assert_eq!(start, end);
    }

    #[test]
    fn master_sector_decode_is_idempotent(pages in 0usize..4, blocks in any::<u32>()) {
        let slots: Vec<Vec<Slot>> = (0..pages)
            .map(|p| vec![Slot::allocated(p as u32, 1, 2, p as u64); p])
            .collect();
        let img = build_image(blocks, &slots);

        let first = MasterSector::decode(&img).unwrap();
        let second = MasterSector::decode(&img).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.total_data_blocks, blocks);
    }

    #[test]
    fn record_count_matches_declared_counts(counts in proptest::collection::vec(0usize..6, 0..8)) {
        let pages: Vec<Vec<Slot>> = counts
            .iter()
            .map(|&n| vec![Slot::allocated(1, 100_000, 200_000, 0); n])
            .collect();
        let img = build_image(8, &pages);

        let volume = Decoder::new(DecodeOptions { workers: 2, ..Default::default() })
            .decode(&img)
            .unwrap();
        prop_assert_eq!(volume.records.len(), counts.iter().sum::<usize>());
        for (i, rec) in volume.records.iter().enumerate() {
            prop_assert_eq!(rec.id, i);
        }
    }
}

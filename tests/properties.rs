mod common;

use std::sync::Arc;

use proptest::collection::vec;
use proptest::prelude::*;
use regcache::arch::{Architecture, ByteOrder, riscv64, x86_64};
use regcache::{CacheOptions, RegisterCache};

use common::*;

fn architectures() -> Vec<Arc<Architecture>> {
    vec![
        x86_64::linux_architecture(),
        riscv64::architecture(),
        toy_architecture(ByteOrder::Big),
        toy_architecture(ByteOrder::Little),
    ]
}

/// A target holding `fill` in every byte of every raw register.
fn filled_target(arch: &Architecture, fill: u8) -> MockTarget {
    (0..arch.raw_count()).fold(MockTarget::default(), |target, regnum| {
        target.with_value(regnum, &vec![fill; arch.descriptor().size(regnum)])
    })
}

fn filled_cache(arch: &Arc<Architecture>, fill: u8) -> (RegisterCache, SharedMock) {
    live_cache(arch.clone(), filled_target(arch, fill), CacheOptions::default())
}

fn any_register(cooked: bool) -> impl Strategy<Value = (Arc<Architecture>, usize)> {
    (0..architectures().len()).prop_flat_map(move |i| {
        let arch = architectures().swap_remove(i);
        let count = if cooked {
            arch.cooked_count()
        } else {
            arch.raw_count()
        };
        (Just(arch), 0..count)
    })
}

fn raw_register_and_bytes() -> impl Strategy<Value = (Arc<Architecture>, usize, Vec<u8>)> {
    any_register(false).prop_flat_map(|(arch, regnum)| {
        let size = arch.descriptor().size(regnum);
        (Just(arch), Just(regnum), vec(any::<u8>(), size))
    })
}

/// A register, an offset into it and bytes that fit from that offset on.
fn partial_transfer(
    cooked: bool,
) -> impl Strategy<Value = (Arc<Architecture>, usize, usize, Vec<u8>)> {
    any_register(cooked)
        .prop_flat_map(|(arch, regnum)| {
            let size = arch.descriptor().size(regnum);
            (Just(arch), Just(regnum), 0..=size)
        })
        .prop_flat_map(|(arch, regnum, offset)| {
            let room = arch.descriptor().size(regnum) - offset;
            (Just(arch), Just(regnum), Just(offset), vec(any::<u8>(), 0..=room))
        })
}

fn patched(mut before: Vec<u8>, offset: usize, bytes: &[u8]) -> Vec<u8> {
    before[offset..offset + bytes.len()].copy_from_slice(bytes);
    before
}

proptest! {
    #[test]
    fn every_raw_register_round_trips(
        (arch, regnum, bytes) in raw_register_and_bytes(),
        fill in any::<u8>()
    ) {
        let (mut cache, mock) = filled_cache(&arch, fill);
        let size = bytes.len();

        cache.raw_write(regnum, &bytes).unwrap();
        let mut back = vec![0u8; size];
        cache.raw_read(regnum, &mut back).unwrap();

        if arch.is_read_only(regnum) {
            prop_assert_eq!(back, vec![fill; size]);
        } else {
            let stored = mock.borrow().values[&regnum].clone();
            prop_assert_eq!(&back, &bytes);
            prop_assert_eq!(&stored, &bytes);
        }
    }

    #[test]
    fn every_raw_register_round_trips_in_a_detached_cache(
        (arch, regnum, bytes) in raw_register_and_bytes()
    ) {
        let mut cache = RegisterCache::detached(arch.clone(), CacheOptions::default());
        cache.raw_write(regnum, &bytes).unwrap();

        let mut back = vec![0u8; bytes.len()];
        let read = cache.raw_read(regnum, &mut back);
        if arch.is_read_only(regnum) {
            prop_assert!(read.is_err());
        } else {
            prop_assert!(read.is_ok());
            prop_assert_eq!(back, bytes);
        }
    }

    #[test]
    fn integer_writes_truncate_to_register_width(
        (arch, regnum) in any_register(false),
        value in any::<u64>()
    ) {
        let size = arch.descriptor().size(regnum);
        prop_assume!(size <= 8 && !arch.is_read_only(regnum));
        let (mut cache, mock) = filled_cache(&arch, 0);

        cache.raw_write_unsigned(regnum, value).unwrap();
        let mask = if size == 8 { u64::MAX } else { (1u64 << (size * 8)) - 1 };
        prop_assert_eq!(cache.raw_read_unsigned(regnum).unwrap(), value & mask);

        let mut expected = vec![0u8; size];
        arch.byte_order().write_unsigned(&mut expected, value);
        let stored = mock.borrow().values[&regnum].clone();
        prop_assert_eq!(stored, expected);
    }

    #[test]
    fn raw_partial_write_changes_only_its_range(
        (arch, regnum, offset, bytes) in partial_transfer(false),
        fill in any::<u8>()
    ) {
        let (mut cache, _mock) = filled_cache(&arch, fill);
        let size = arch.descriptor().size(regnum);
        let before = vec![fill; size];

        cache.raw_write_part(regnum, offset, &bytes).unwrap();
        let mut after = vec![0u8; size];
        cache.raw_read(regnum, &mut after).unwrap();

        if arch.is_read_only(regnum) {
            prop_assert_eq!(after, before);
        } else {
            prop_assert_eq!(&after, &patched(before, offset, &bytes));
            let mut part = vec![0u8; bytes.len()];
            cache.raw_read_part(regnum, offset, &mut part).unwrap();
            prop_assert_eq!(part, bytes);
        }
    }

    #[test]
    fn cooked_partial_write_changes_only_its_range(
        (arch, regnum, offset, bytes) in partial_transfer(true),
        fill in any::<u8>()
    ) {
        let (mut cache, _mock) = filled_cache(&arch, fill);
        let size = arch.descriptor().size(regnum);
        let mut before = vec![0u8; size];
        cache.cooked_read(regnum, &mut before).unwrap();

        cache.cooked_write_part(regnum, offset, &bytes).unwrap();
        let mut after = vec![0u8; size];
        cache.cooked_read(regnum, &mut after).unwrap();

        if regnum < arch.raw_count() && arch.is_read_only(regnum) {
            prop_assert_eq!(after, before);
        } else {
            prop_assert_eq!(after, patched(before, offset, &bytes));
        }
    }
}

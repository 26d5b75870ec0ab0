//! Range encodings of identifier sets.
use crate::core::{DataReader, DataWriter, DecodeError, EncodeError, IdSet};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

const COUNT_BITS: u32 = 12;
const ID_BITS: u32 = 16;

/// One entry of an array of ranges, such as a TCF publisher restriction.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RangeEntry {
    pub key: u16,
    #[serde(rename = "type")]
    pub range_type: u16,
    pub ids: IdSet,
}

impl RangeEntry {
    pub fn new<I: IntoIterator<Item = u16>>(key: u16, range_type: u16, ids: I) -> Self {
        Self {
            key,
            range_type,
            ids: ids.into_iter().collect(),
        }
    }

    pub fn ranges(&self) -> Vec<RangeInclusive<u16>> {
        collapse_ranges(&self.ids)
    }
}

/// Finds the entry for `key` and `range_type`.
pub fn find_entry(entries: &[RangeEntry], key: u16, range_type: u16) -> Option<&RangeEntry> {
    entries
        .iter()
        .find(|e| e.key == key && e.range_type == range_type)
}

/// Collapses consecutive ids into the minimal list of closed ranges.
pub fn collapse_ranges(ids: &IdSet) -> Vec<RangeInclusive<u16>> {
    let mut ranges: Vec<RangeInclusive<u16>> = vec![];
    for &id in ids {
        match ranges.last_mut() {
            Some(r) if r.end().checked_add(1) == Some(id) => *r = *r.start()..=id,
            _ => ranges.push(id..=id),
        }
    }
    ranges
}

fn too_many_ranges(found: usize) -> EncodeError {
    EncodeError::TooManyElements {
        max: (1 << COUNT_BITS) - 1,
        found,
    }
}

fn read_id(r: &DataReader<'_>, value: u64) -> Result<u16, DecodeError> {
    u16::try_from(value).map_err(|_| DecodeError::InvalidValue {
        expected: "an identifier of at most 16 bits".to_string(),
        found: format!("{value} at bit {}", r.position()),
    })
}

fn check_order(start: u16, end: u16) -> Result<(), DecodeError> {
    if start > end {
        return Err(DecodeError::InvalidValue {
            expected: "a range start lower than its end".to_string(),
            found: format!("{start}-{end}"),
        });
    }
    Ok(())
}

impl DataReader<'_> {
    pub fn read_integer_range(&mut self) -> Result<IdSet, DecodeError> {
        let n = self.read_fixed_integer(COUNT_BITS)?;
        let mut ids = IdSet::new();

        for _ in 0..n {
            let is_group = self.read_bool()?;
            if is_group {
                let start = self.read_fixed_integer(ID_BITS)? as u16;
                let end = self.read_fixed_integer(ID_BITS)? as u16;
                check_order(start, end)?;
                ids.extend(start..=end);
            } else {
                ids.insert(self.read_fixed_integer(ID_BITS)? as u16);
            }
        }

        Ok(ids)
    }

    pub fn skip_integer_range(&mut self) -> Result<(), DecodeError> {
        let n = self.read_fixed_integer(COUNT_BITS)?;
        for _ in 0..n {
            let is_group = self.read_bool()?;
            self.skip(u64::from(ID_BITS) * if is_group { 2 } else { 1 })?;
        }
        Ok(())
    }

    pub fn read_fibonacci_range(&mut self) -> Result<IdSet, DecodeError> {
        let n = self.read_fixed_integer(COUNT_BITS)?;
        let mut ids = IdSet::new();
        let mut last_id = 0u64;

        for _ in 0..n {
            let is_group = self.read_bool()?;
            let start = last_id.saturating_add(self.read_fibonacci_integer()?);
            let end = if is_group {
                start.saturating_add(self.read_fibonacci_integer()?)
            } else {
                start
            };
            let start_id = read_id(self, start)?;
            let end_id = read_id(self, end)?;
            ids.extend(start_id..=end_id);
            last_id = end;
        }

        Ok(ids)
    }

    pub fn skip_fibonacci_range(&mut self) -> Result<(), DecodeError> {
        let n = self.read_fixed_integer(COUNT_BITS)?;
        for _ in 0..n {
            let is_group = self.read_bool()?;
            self.skip_fibonacci_integer()?;
            if is_group {
                self.skip_fibonacci_integer()?;
            }
        }
        Ok(())
    }

    /// Reads a max id followed by either an integer range or a bitfield.
    pub fn read_optimized_range(&mut self) -> Result<IdSet, DecodeError> {
        let max_id = self.read_fixed_integer(ID_BITS)?;
        let is_range = self.read_bool()?;
        if is_range {
            let ids = self.read_integer_range()?;
            Ok(ids)
        } else {
            let bits = self.read_fixed_bitfield(max_id as usize)?;
            Ok(bits
                .into_iter()
                .zip(1u16..)
                .filter_map(|(bit, id)| bit.then_some(id))
                .collect())
        }
    }

    pub fn skip_optimized_range(&mut self) -> Result<(), DecodeError> {
        let max_id = self.read_fixed_integer(ID_BITS)?;
        let is_range = self.read_bool()?;
        if is_range {
            self.skip_integer_range()
        } else {
            self.skip(max_id)
        }
    }

    pub fn read_array_of_ranges(
        &mut self,
        key_bits: u32,
        type_bits: u32,
    ) -> Result<Vec<RangeEntry>, DecodeError> {
        let n = self.read_fixed_integer(COUNT_BITS)?;
        (0..n)
            .map(|_| {
                let key = self.read_fixed_integer(key_bits)?;
                let range_type = self.read_fixed_integer(type_bits)?;
                Ok(RangeEntry {
                    key: read_id(self, key)?,
                    range_type: read_id(self, range_type)?,
                    ids: self.read_integer_range()?,
                })
            })
            .collect()
    }

    pub fn skip_array_of_ranges(&mut self, key_bits: u32, type_bits: u32) -> Result<(), DecodeError> {
        let n = self.read_fixed_integer(COUNT_BITS)?;
        for _ in 0..n {
            self.skip(u64::from(key_bits + type_bits))?;
            self.skip_integer_range()?;
        }
        Ok(())
    }
}

impl DataWriter {
    pub fn write_integer_range(&mut self, ids: &IdSet) -> Result<(), EncodeError> {
        let ranges = collapse_ranges(ids);
        self.write_fixed_integer(ranges.len() as u64, COUNT_BITS)
            .map_err(|_| too_many_ranges(ranges.len()))?;

        for r in ranges {
            if r.start() == r.end() {
                self.write_bool(false)?;
                self.write_fixed_integer(u64::from(*r.start()), ID_BITS)?;
            } else {
                self.write_bool(true)?;
                self.write_fixed_integer(u64::from(*r.start()), ID_BITS)?;
                self.write_fixed_integer(u64::from(*r.end()), ID_BITS)?;
            }
        }

        Ok(())
    }

    /// Writes ranges as fibonacci encoded offsets from the end of the
    /// previous range.
    pub fn write_fibonacci_range(&mut self, ids: &IdSet) -> Result<(), EncodeError> {
        let ranges = collapse_ranges(ids);
        self.write_fixed_integer(ranges.len() as u64, COUNT_BITS)
            .map_err(|_| too_many_ranges(ranges.len()))?;

        let mut last_id = 0u64;
        for r in ranges {
            let start = u64::from(*r.start());
            let end = u64::from(*r.end());
            if start == end {
                self.write_bool(false)?;
                self.write_fibonacci_integer(start - last_id)?;
            } else {
                self.write_bool(true)?;
                self.write_fibonacci_integer(start - last_id)?;
                self.write_fibonacci_integer(end - start)?;
            }
            last_id = end;
        }

        Ok(())
    }

    /// Writes the shorter of the integer range and bitfield forms.
    ///
    /// The bitfield form starts at id 1, so id 0 is rejected whichever form
    /// is chosen.
    pub fn write_optimized_range(&mut self, ids: &IdSet) -> Result<(), EncodeError> {
        if ids.contains(&0) {
            return Err(EncodeError::InvalidValue {
                expected: "identifiers starting at 1".to_string(),
                found: "0".to_string(),
            });
        }
        let max_id = ids.last().copied().unwrap_or_default();

        let mut range = DataWriter::new();
        range.write_integer_range(ids)?;
        let range = range.finish()?;

        self.write_fixed_integer(u64::from(max_id), ID_BITS)?;
        if range.len() <= u64::from(max_id) {
            self.write_bool(true)?;
            self.write_bits(&range)
        } else {
            self.write_bool(false)?;
            for id in 1..=max_id {
                self.write_bool(ids.contains(&id))?;
            }
            Ok(())
        }
    }

    pub fn write_array_of_ranges(
        &mut self,
        entries: &[RangeEntry],
        key_bits: u32,
        type_bits: u32,
    ) -> Result<(), EncodeError> {
        self.write_fixed_integer(entries.len() as u64, COUNT_BITS)
            .map_err(|_| too_many_ranges(entries.len()))?;
        for e in entries {
            self.write_fixed_integer(u64::from(e.key), key_bits)?;
            self.write_fixed_integer(u64::from(e.range_type), type_bits)?;
            self.write_integer_range(&e.ids)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BitString;
    use crate::core::tests::b;
    use test_case::test_case;

    fn set<const N: usize>(ids: [u16; N]) -> IdSet {
        IdSet::from(ids)
    }

    fn written(f: impl FnOnce(&mut DataWriter) -> Result<(), EncodeError>) -> BitString {
        let mut w = DataWriter::new();
        f(&mut w).unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn collapse_consecutive_ids() {
        assert_eq!(
            collapse_ranges(&set([1, 2, 3, 5, 7, 8, 9])),
            vec![1..=3, 5..=5, 7..=9]
        );
        assert!(collapse_ranges(&IdSet::new()).is_empty());
        assert_eq!(collapse_ranges(&set([u16::MAX])), vec![u16::MAX..=u16::MAX]);
    }

    #[test_case("000000000010 0 0000000000000011 1 0000000000000101 0000000000001000" => set([3, 5, 6, 7, 8]) ; "single and group")]
    #[test_case("000000000000" => IdSet::new() ; "empty")]
    fn read_integer_range(s: &str) -> IdSet {
        b(s).reader().read_integer_range().unwrap()
    }

    #[test]
    fn integer_range_round_trip() {
        let ids = set([1, 2, 3, 5, 7, 8, 9]);
        let bits = written(|w| w.write_integer_range(&ids));
        // count, one group, one single, one group
        assert_eq!(bits.len(), 12 + 33 + 17 + 33);
        assert_eq!(bits.reader().read_integer_range().unwrap(), ids);
    }

    #[test]
    fn reversed_integer_range_fails() {
        let s = b("000000000001 1 0000000000000101 0000000000000011");
        assert!(matches!(
            s.reader().read_integer_range(),
            Err(DecodeError::InvalidValue { .. })
        ));
    }

    #[test_case("000000000010 0 0011 1 011 0011" => set([3, 5, 6, 7, 8]))]
    #[test_case("000000000010 0 011 0 1011" => set([2, 6]))]
    fn read_fibonacci_range(s: &str) -> IdSet {
        b(s).reader().read_fibonacci_range().unwrap()
    }

    #[test_case(set([2, 6]), "000000000010 0 011 0 1011" ; "offsets from previous id")]
    #[test_case(set([3, 5, 6, 7, 8]), "000000000010 0 0011 1 011 0011" ; "group")]
    #[test_case(IdSet::new(), "000000000000" ; "empty")]
    fn write_fibonacci_range(ids: IdSet, expected: &str) {
        assert_eq!(written(|w| w.write_fibonacci_range(&ids)), b(expected));
    }

    #[test]
    fn fibonacci_range_zero_id_fails() {
        assert!(matches!(
            DataWriter::new().write_fibonacci_range(&set([0])),
            Err(EncodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn skip_fibonacci_range() {
        let s = b("000000000010 0 0011 1 011 0011 101");
        let mut r = s.reader();
        r.skip_fibonacci_range().unwrap();
        assert_eq!(r.remaining(), 3);
    }

    #[test_case("0000000000001000 1 000000000010 0 0000000000000011 1 0000000000000101 0000000000001000" => set([3, 5, 6, 7, 8]) ; "range")]
    #[test_case("0000000000000101 0 10101" => set([1, 3, 5]) ; "bitfield")]
    #[test_case("0000000000000000 0" => IdSet::new() ; "empty")]
    fn read_optimized_range(s: &str) -> IdSet {
        b(s).reader().read_optimized_range().unwrap()
    }

    #[test]
    fn optimized_range_picks_bitfield_for_dense_sets() {
        let ids = set([1, 3, 5]);
        let bits = written(|w| w.write_optimized_range(&ids));
        assert_eq!(bits, b("0000000000000101 0 10101"));
    }

    #[test]
    fn optimized_range_picks_range_for_sparse_sets() {
        let ids = set([1000, 1001, 1002]);
        let bits = written(|w| w.write_optimized_range(&ids));
        assert_eq!(bits.len(), 16 + 1 + 12 + 33);
        assert_eq!(bits.reader().read_optimized_range().unwrap(), ids);
    }

    #[test]
    fn optimized_range_empty_set() {
        assert_eq!(
            written(|w| w.write_optimized_range(&IdSet::new())),
            b("0000000000000000 0")
        );
    }

    #[test_case(set([0]) ; "zero only")]
    #[test_case(set([0, 5]) ; "bitfield form")]
    #[test_case(set([0, 1000, 1001]) ; "range form")]
    fn optimized_range_zero_id_fails(ids: IdSet) {
        assert!(matches!(
            DataWriter::new().write_optimized_range(&ids),
            Err(EncodeError::InvalidValue { .. })
        ));
    }

    #[test]
    fn skip_optimized_range() {
        let s = b("0000000000000101 0 10101 11");
        let mut r = s.reader();
        r.skip_optimized_range().unwrap();
        assert_eq!(r.remaining(), 2);
    }

    #[test_case("000000000000" => Vec::<RangeEntry>::new() ; "empty")]
    #[test_case("000000000001 000011 01 000000000010 0 0000000000000001 1 0000000000000011 0000000000000101" => vec![
        RangeEntry::new(3, 1, [1, 3, 4, 5]),
    ] ; "1 element")]
    #[test_case("000000000010 000011 01 000000000001 0 0000000000000001 000010 10 000000000001 1 0000000000000011 0000000000000101" => vec![
        RangeEntry::new(3, 1, [1]),
        RangeEntry::new(2, 2, [3, 4, 5]),
    ] ; "2 elements")]
    fn read_array_of_ranges(s: &str) -> Vec<RangeEntry> {
        b(s).reader().read_array_of_ranges(6, 2).unwrap()
    }

    #[test]
    fn array_of_ranges_round_trip() {
        let entries = vec![
            RangeEntry::new(1, 0, [8, 9, 10, 42]),
            RangeEntry::new(7, 2, [3]),
        ];
        let bits = written(|w| w.write_array_of_ranges(&entries, 6, 2));
        assert_eq!(bits.reader().read_array_of_ranges(6, 2).unwrap(), entries);

        let mut r = bits.reader();
        r.skip_array_of_ranges(6, 2).unwrap();
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn find_entry_by_key_and_type() {
        let entries = vec![RangeEntry::new(1, 0, [8]), RangeEntry::new(1, 1, [9])];
        assert_eq!(find_entry(&entries, 1, 1).map(|e| &e.ids), Some(&set([9])));
        assert!(find_entry(&entries, 2, 0).is_none());
    }
}

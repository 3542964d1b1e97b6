use bytes::Bytes;
use model::core::{column_type::ColumnType, value::Value};
use xxhash_rust::xxh3::xxh3_64;

/// Canonical bytes of a partition key value, as sent in the routing key of a
/// single-partition call.
///
/// Integer columns are encoded as 8-byte big-endian `i64` regardless of their
/// declared width, so a `TINYINT` 5 and a `BIGINT` 5 route identically.
pub fn key_bytes(value: &Value, column_type: ColumnType) -> Bytes {
    match value {
        Value::Null => Bytes::new(),
        Value::Int(v) => Bytes::copy_from_slice(&v.to_be_bytes()),
        Value::Float(v) if column_type.is_integer() => {
            Bytes::copy_from_slice(&(*v as i64).to_be_bytes())
        }
        Value::Float(v) => Bytes::copy_from_slice(&v.to_bits().to_be_bytes()),
        Value::Decimal(v) => Bytes::from(v.normalized().to_string()),
        Value::String(v) => Bytes::copy_from_slice(v.as_bytes()),
        Value::Bytes(v) => Bytes::copy_from_slice(v),
        Value::Timestamp(v) => Bytes::copy_from_slice(&v.timestamp_micros().to_be_bytes()),
    }
}

/// Maps routing keys to partition ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hashinator {
    partition_count: u32,
}

impl Hashinator {
    pub fn new(partition_count: u32) -> Self {
        Self {
            partition_count: partition_count.max(1),
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// An empty key (NULL) always lands on partition 0.
    pub fn partition_for(&self, key: &[u8]) -> u32 {
        if key.is_empty() {
            return 0;
        }
        (xxh3_64(key) % u64::from(self.partition_count)) as u32
    }

    pub fn partition_for_value(&self, value: &Value, column_type: ColumnType) -> u32 {
        self.partition_for(&key_bytes(value, column_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_width_independent() {
        assert_eq!(
            key_bytes(&Value::Int(5), ColumnType::TinyInt),
            key_bytes(&Value::Int(5), ColumnType::BigInt)
        );
        assert_eq!(
            key_bytes(&Value::Int(1), ColumnType::Integer).as_ref(),
            &[0, 0, 0, 0, 0, 0, 0, 1]
        );
    }

    #[test]
    fn strings_are_utf8() {
        let key = key_bytes(&Value::String("héllo".into()), ColumnType::VarChar);
        assert_eq!(key.as_ref(), "héllo".as_bytes());
    }

    #[test]
    fn partitions_are_stable_and_in_range() {
        let hashinator = Hashinator::new(8);
        for i in 0..1_000 {
            let key = key_bytes(&Value::Int(i), ColumnType::BigInt);
            let partition = hashinator.partition_for(&key);
            assert!(partition < 8);
            assert_eq!(partition, hashinator.partition_for(&key));
        }
        assert_eq!(hashinator.partition_for(&[]), 0);
    }

    #[test]
    fn keys_spread_over_partitions() {
        let hashinator = Hashinator::new(4);
        let mut seen = [false; 4];
        for i in 0..200 {
            seen[hashinator.partition_for_value(&Value::Int(i), ColumnType::BigInt) as usize] =
                true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}

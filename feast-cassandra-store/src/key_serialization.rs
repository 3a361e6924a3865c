use crate::config::EntityKeySerializationVersion;
use crate::feast::types::value::Val;
use crate::feast::types::value_type::Enum;
use crate::feast::types::{EntityKey, Value};
use anyhow::{Result, anyhow};
use std::collections::HashMap;

fn serialize_value(value: &Value) -> Result<Vec<u8>> {
    let val = value
        .val
        .as_ref()
        .ok_or_else(|| anyhow!("Cannot serialize an empty entity key value"))?;
    match val {
        Val::Int32Val(v) => {
            let mut bytes = Vec::with_capacity(12);
            bytes.extend((Enum::Int32 as u32).to_le_bytes());
            bytes.extend(4u32.to_le_bytes());
            bytes.extend(v.to_le_bytes());
            Ok(bytes)
        }
        Val::Int64Val(v) => {
            let mut bytes = Vec::with_capacity(16);
            bytes.extend((Enum::Int64 as u32).to_le_bytes());
            bytes.extend(8u32.to_le_bytes());
            bytes.extend(v.to_le_bytes());
            Ok(bytes)
        }
        Val::StringVal(v) => {
            let mut bytes = vec![];
            bytes.extend((Enum::String as u32).to_le_bytes());
            bytes.extend((v.len() as u32).to_le_bytes());
            bytes.extend(v.as_bytes());
            Ok(bytes)
        }
        Val::BytesVal(v) => {
            let mut bytes = vec![];
            bytes.extend((Enum::Bytes as u32).to_le_bytes());
            bytes.extend((v.len() as u32).to_le_bytes());
            bytes.extend(v);
            Ok(bytes)
        }
        other => Err(anyhow!(
            "Unsupported entity key value type: {:?}, only scalar int32, int64, \
             string and bytes values can be part of an entity key",
            other
        )),
    }
}

/// Canonical byte form of an entity key: join keys sorted, key count first,
/// then every key name and every value as (type tag, length, payload), all
/// integers little-endian.
pub fn serialize_key(
    entity_key: &EntityKey,
    serialization_version: EntityKeySerializationVersion,
) -> Result<Vec<u8>> {
    match serialization_version {
        EntityKeySerializationVersion::V1 | EntityKeySerializationVersion::V2 => {
            return Err(anyhow!(
                "Unsupported entity key serialization version {}, only version 3 \
                 is implemented",
                u64::from(serialization_version)
            ));
        }
        EntityKeySerializationVersion::V3 => {}
    }
    let key_map: HashMap<&str, &Value> = entity_key
        .join_keys
        .iter()
        .map(|s| s.as_str())
        .zip(entity_key.entity_values.iter())
        .collect();
    let mut sorted_keys: Vec<&str> = key_map.keys().cloned().collect();
    sorted_keys.sort();
    let mut bytes: Vec<u8> = vec![];
    bytes.extend((sorted_keys.len() as u32).to_le_bytes());
    for key in &sorted_keys {
        bytes.extend((Enum::String as u32).to_le_bytes());
        bytes.extend((key.len() as u32).to_le_bytes());
        bytes.extend(key.bytes());
    }
    for key in &sorted_keys {
        let value = key_map
            .get(key)
            .ok_or_else(|| anyhow!("Join key '{}' has no entity value", key))?;
        bytes.extend(serialize_value(value)?);
    }
    Ok(bytes)
}

/// The `entity_key` column is TEXT, so the canonical bytes travel as
/// lowercase hex.
pub fn serialize_key_hex(
    entity_key: &EntityKey,
    serialization_version: EntityKeySerializationVersion,
) -> Result<String> {
    let bytes = serialize_key(entity_key, serialization_version)?;
    Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

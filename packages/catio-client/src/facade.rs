//! The query facade (C8): name-dispatched `get_*` / `set_*` operations for
//! the controller layer.
//!
//! `query(name, args)` resolves `get_<name>`, `command(name, args)` resolves
//! `set_<name>` in a registry built at construction. Handlers are async and
//! exchange `serde_json::Value`s, so the external layer never touches wire
//! types. A name with no handler is a first-class `UnknownOperation`.

use crate::client::Client;
use crate::errors::{ClientError, Result};
use crate::symbols::AdsDataType;
use catio_core::ads::string::{decode_plc_string, encode_plc_string};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;
type HandlerFn = for<'a> fn(&'a Client, Value) -> HandlerFuture<'a>;

/// The name-dispatch layer over a [`Client`].
pub struct Facade {
    client: Client,
    registry: HashMap<&'static str, HandlerFn>,
}

impl Facade {
    /// Builds the facade with every operation registered.
    pub fn new(client: Client) -> Self {
        let mut registry: HashMap<&'static str, HandlerFn> = HashMap::new();
        registry.insert("get_state", get_state as HandlerFn);
        registry.insert("get_device_info", get_device_info);
        registry.insert("get_device_count", get_device_count);
        registry.insert("get_devices", get_devices);
        registry.insert("get_slaves", get_slaves);
        registry.insert("get_frame_counters", get_frame_counters);
        registry.insert("get_link_state", get_link_state);
        registry.insert("get_symbols", get_symbols);
        registry.insert("get_dropped_symbols", get_dropped_symbols);
        registry.insert("get_symbol_value", get_symbol_value);
        registry.insert("set_symbol_value", set_symbol_value);

        Self { client, registry }
    }

    /// The wrapped client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Invokes the `get_<name>` handler.
    pub async fn query(&self, name: &str, args: Value) -> Result<Value> {
        self.dispatch("get_", name, args).await
    }

    /// Invokes the `set_<name>` handler.
    pub async fn command(&self, name: &str, args: Value) -> Result<Value> {
        self.dispatch("set_", name, args).await
    }

    async fn dispatch(&self, prefix: &str, name: &str, args: Value) -> Result<Value> {
        let key = format!("{prefix}{name}");
        let handler = self
            .registry
            .get(key.as_str())
            .ok_or_else(|| ClientError::UnknownOperation { name: key.clone() })?;
        handler(&self.client, args).await
    }
}

fn arg_u32(args: &Value, key: &str) -> Result<u32> {
    args.get(key)
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| ClientError::InvalidArgument {
            message: format!("missing or invalid {key:?}"),
        })
}

fn arg_string(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidArgument {
            message: format!("missing or invalid {key:?}"),
        })
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| ClientError::InvalidArgument {
        message: format!("serialization failed: {e}"),
    })
}

fn find_device<'a>(
    server: &'a crate::topology::IoServer,
    device_id: u32,
) -> Result<&'a crate::topology::IoDevice> {
    server
        .device(device_id)
        .ok_or_else(|| ClientError::InvalidArgument {
            message: format!("no device with id {device_id}"),
        })
}

fn get_state(client: &Client, _args: Value) -> HandlerFuture<'_> {
    Box::pin(async move { to_value(&client.state()) })
}

fn get_device_info(client: &Client, _args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let info = client.read_device_info().await?;
        Ok(json!({
            "name": info.name.as_str(),
            "version": info.version(),
            "build": info.build,
        }))
    })
}

fn get_device_count(client: &Client, _args: Value) -> HandlerFuture<'_> {
    Box::pin(async move { Ok(json!(client.topology()?.devices.len())) })
}

fn get_devices(client: &Client, _args: Value) -> HandlerFuture<'_> {
    Box::pin(async move { to_value(&client.topology()?.devices) })
}

fn get_slaves(client: &Client, args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let device_id = arg_u32(&args, "device_id")?;
        let server = client.topology()?;
        to_value(&find_device(&server, device_id)?.slaves)
    })
}

fn get_frame_counters(client: &Client, args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let device_id = arg_u32(&args, "device_id")?;
        client.refresh_counters().await?;
        let server = client.topology()?;
        to_value(&find_device(&server, device_id)?.frame_counters)
    })
}

fn get_link_state(client: &Client, args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let device_id = arg_u32(&args, "device_id")?;
        client.refresh_link_states().await?;
        let server = client.topology()?;
        to_value(&find_device(&server, device_id)?.link_state)
    })
}

fn get_symbols(client: &Client, args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let device_id = arg_u32(&args, "device_id")?;
        let catalog = client.symbols(device_id).await?;
        to_value(&catalog.symbols())
    })
}

fn get_dropped_symbols(client: &Client, args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let device_id = arg_u32(&args, "device_id")?;
        let catalog = client.symbols(device_id).await?;
        Ok(json!(catalog.dropped()))
    })
}

fn get_symbol_value(client: &Client, args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let device_id = arg_u32(&args, "device_id")?;
        let name = arg_string(&args, "name")?;
        let catalog = client.symbols(device_id).await?;
        let symbol = catalog
            .get(&name)
            .ok_or_else(|| ClientError::UnknownSymbol {
                name: name.clone(),
                device_id,
            })?;

        let bytes = client.read_symbol(device_id, &name).await?;
        decode_value(symbol.data_type, &bytes)
    })
}

fn set_symbol_value(client: &Client, args: Value) -> HandlerFuture<'_> {
    Box::pin(async move {
        let device_id = arg_u32(&args, "device_id")?;
        let name = arg_string(&args, "name")?;
        let value = args
            .get("value")
            .cloned()
            .ok_or_else(|| ClientError::InvalidArgument {
                message: "missing \"value\"".to_string(),
            })?;

        let catalog = client.symbols(device_id).await?;
        let symbol = catalog
            .get(&name)
            .ok_or_else(|| ClientError::UnknownSymbol {
                name: name.clone(),
                device_id,
            })?;

        let bytes = encode_value(symbol.data_type, symbol.size, &value)?;
        client.write_symbol(device_id, &name, bytes).await?;
        Ok(Value::Null)
    })
}

fn bad_value(message: impl Into<String>) -> ClientError {
    ClientError::InvalidArgument {
        message: message.into(),
    }
}

fn need(bytes: &[u8], n: usize) -> Result<&[u8]> {
    bytes
        .get(..n)
        .ok_or_else(|| bad_value(format!("value needs {n} bytes, got {}", bytes.len())))
}

/// Decodes raw symbol bytes into a JSON value per datatype.
pub fn decode_value(data_type: AdsDataType, bytes: &[u8]) -> Result<Value> {
    let value = match data_type {
        AdsDataType::Bit => json!(need(bytes, 1)?[0] != 0),
        AdsDataType::Int8 => json!(need(bytes, 1)?[0] as i8),
        AdsDataType::UInt8 => json!(need(bytes, 1)?[0]),
        AdsDataType::Int16 => json!(i16::from_le_bytes(need(bytes, 2)?.try_into().unwrap())),
        AdsDataType::UInt16 => json!(u16::from_le_bytes(need(bytes, 2)?.try_into().unwrap())),
        AdsDataType::Int32 => json!(i32::from_le_bytes(need(bytes, 4)?.try_into().unwrap())),
        AdsDataType::UInt32 => json!(u32::from_le_bytes(need(bytes, 4)?.try_into().unwrap())),
        AdsDataType::Int64 => json!(i64::from_le_bytes(need(bytes, 8)?.try_into().unwrap())),
        AdsDataType::UInt64 => json!(u64::from_le_bytes(need(bytes, 8)?.try_into().unwrap())),
        AdsDataType::Real32 => json!(f32::from_le_bytes(need(bytes, 4)?.try_into().unwrap())),
        AdsDataType::Real64 => json!(f64::from_le_bytes(need(bytes, 8)?.try_into().unwrap())),
        AdsDataType::String => json!(decode_plc_string(bytes)),
        AdsDataType::BigType => json!(bytes),
    };
    Ok(value)
}

/// Encodes a JSON value into raw symbol bytes per datatype.
///
/// The result is exactly `size` bytes; strings are NUL-padded and composite
/// values must supply every byte.
pub fn encode_value(data_type: AdsDataType, size: u32, value: &Value) -> Result<Vec<u8>> {
    let size = size as usize;

    fn int<T: TryFrom<i64>>(value: &Value) -> Result<T> {
        value
            .as_i64()
            .and_then(|v| T::try_from(v).ok())
            .ok_or_else(|| bad_value("expected an integer in range"))
    }

    let bytes: Vec<u8> = match data_type {
        AdsDataType::Bit => {
            let b = value.as_bool().ok_or_else(|| bad_value("expected a bool"))?;
            vec![b as u8]
        }
        AdsDataType::Int8 => int::<i8>(value)?.to_le_bytes().to_vec(),
        AdsDataType::UInt8 => int::<u8>(value)?.to_le_bytes().to_vec(),
        AdsDataType::Int16 => int::<i16>(value)?.to_le_bytes().to_vec(),
        AdsDataType::UInt16 => int::<u16>(value)?.to_le_bytes().to_vec(),
        AdsDataType::Int32 => int::<i32>(value)?.to_le_bytes().to_vec(),
        AdsDataType::UInt32 => int::<u32>(value)?.to_le_bytes().to_vec(),
        AdsDataType::Int64 => value
            .as_i64()
            .ok_or_else(|| bad_value("expected an integer"))?
            .to_le_bytes()
            .to_vec(),
        AdsDataType::UInt64 => value
            .as_u64()
            .ok_or_else(|| bad_value("expected an unsigned integer"))?
            .to_le_bytes()
            .to_vec(),
        AdsDataType::Real32 => (value
            .as_f64()
            .ok_or_else(|| bad_value("expected a number"))? as f32)
            .to_le_bytes()
            .to_vec(),
        AdsDataType::Real64 => value
            .as_f64()
            .ok_or_else(|| bad_value("expected a number"))?
            .to_le_bytes()
            .to_vec(),
        AdsDataType::String => {
            let s = value.as_str().ok_or_else(|| bad_value("expected a string"))?;
            let encoded = encode_plc_string(s);
            if encoded.len() > size {
                return Err(bad_value(format!(
                    "string needs {} bytes, symbol holds {size}",
                    encoded.len()
                )));
            }
            encoded
        }
        AdsDataType::BigType => {
            let array = value
                .as_array()
                .ok_or_else(|| bad_value("expected a byte array"))?;
            array
                .iter()
                .map(|v| {
                    v.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| bad_value("expected bytes 0..=255"))
                })
                .collect::<Result<Vec<u8>>>()?
        }
    };

    if bytes.len() > size {
        return Err(bad_value(format!(
            "encoded value is {} bytes, symbol holds {size}",
            bytes.len()
        )));
    }
    let mut out = bytes;
    out.resize(size, 0);
    Ok(out)
}

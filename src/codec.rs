// This file is part of StrataDB.
//
// This Source Code Form is subject to the terms of the Mozilla Public License
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at http://mozilla.org/MPL/2.0/.

//! Payload codec: maps domain-event payloads to and from their opaque stored
//! representation, dispatching decoders on a schema-version tag.
//!
//! The registry is populated once at store construction from an explicit
//! initialization list (no runtime type scanning) and is read-only afterwards,
//! so it is shared freely across concurrent readers and writers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::model::SchemaVersion;

/// Allocating serializer used for payloads and commit documents.
pub type PayloadSerializer<'a> = rkyv::api::high::HighSerializer<
    rkyv::util::AlignedVec,
    rkyv::ser::allocator::ArenaHandle<'a>,
    rkyv::rancor::Error,
>;

/// Validator used when decoding stored bytes (`bytecheck`-backed).
pub type PayloadValidator<'a> = rkyv::api::high::HighValidator<'a, rkyv::rancor::Error>;

/// Deserializer used to materialize owned values from archived bytes.
pub type PayloadDeserializer = rkyv::api::high::HighDeserializer<rkyv::rancor::Error>;

/// Serialize a value to stored bytes.
pub fn serialize<T>(value: &T) -> Result<Vec<u8>>
where
    T: for<'a> rkyv::Serialize<PayloadSerializer<'a>>,
{
    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(value)?;
    Ok(bytes.to_vec())
}

/// Deserialize a value from stored bytes.
///
/// Bytes coming back from a backend are not guaranteed to be aligned, so they
/// are copied into an aligned scratch buffer before validated access.
pub fn deserialize<T>(bytes: &[u8]) -> Result<T>
where
    T: rkyv::Archive,
    T::Archived: for<'a> rkyv::bytecheck::CheckBytes<PayloadValidator<'a>>
        + rkyv::Deserialize<T, PayloadDeserializer>,
{
    let mut aligned = rkyv::util::AlignedVec::<16>::new();
    aligned.extend_from_slice(bytes);
    let value = rkyv::from_bytes::<T, rkyv::rancor::Error>(&aligned)?;
    Ok(value)
}

/// Capability trait for domain-event payloads ("is a domain event").
///
/// Object-safe: the store carries payloads as `Box<dyn EventPayload>` without
/// knowing concrete shapes by name.
pub trait EventPayload: fmt::Debug + Send + Sync + 'static {
    /// The schema version tag persisted next to the encoded payload.
    fn schema(&self) -> SchemaVersion;

    /// Encodes the payload to its opaque stored representation.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Downcast support, mainly for tests asserting round-trip equality.
    fn as_any(&self) -> &dyn Any;
}

/// A registerable payload shape: a concrete type tied to one schema version.
pub trait PayloadType: EventPayload + Sized {
    const SCHEMA: SchemaVersion;

    /// Decodes the payload from its stored representation.
    fn decode(bytes: &[u8]) -> Result<Self>;
}

type DecodeFn = fn(&[u8]) -> Result<Box<dyn EventPayload>>;

fn decode_erased<T: PayloadType>(bytes: &[u8]) -> Result<Box<dyn EventPayload>> {
    T::decode(bytes).map(|payload| Box::new(payload) as Box<dyn EventPayload>)
}

/// One entry of the initialization list handed to the store builder.
///
/// This is the declarative replacement for runtime type discovery: the host
/// process lists every payload shape it knows once, at startup.
#[derive(Clone, Copy)]
pub struct PayloadRegistration {
    schema: SchemaVersion,
    decode: DecodeFn,
}

impl PayloadRegistration {
    pub fn of<T: PayloadType>() -> Self {
        Self {
            schema: T::SCHEMA,
            decode: decode_erased::<T>,
        }
    }

    pub fn schema(&self) -> SchemaVersion {
        self.schema
    }
}

impl fmt::Debug for PayloadRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadRegistration")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Registry of payload decoders keyed by schema version.
///
/// Written once at construction, read-only thereafter.
#[derive(Debug, Default)]
pub struct PayloadCodec {
    decoders: HashMap<u32, DecodeFn>,
}

impl PayloadCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one payload shape. Idempotent: registering the same shape
    /// twice is a no-op, not an error.
    pub fn register<T: PayloadType>(&mut self) {
        self.register_entry(PayloadRegistration::of::<T>());
    }

    /// Registers one initialization-list entry. Idempotent.
    pub fn register_entry(&mut self, registration: PayloadRegistration) {
        self.decoders
            .entry(registration.schema.get())
            .or_insert(registration.decode);
    }

    /// Builds a codec from a whole initialization list in one pass.
    ///
    /// Registrations are independent and idempotent, so the order of the list
    /// does not matter.
    pub fn register_all(registrations: impl IntoIterator<Item = PayloadRegistration>) -> Self {
        let mut codec = Self::new();
        for registration in registrations {
            codec.register_entry(registration);
        }
        codec
    }

    pub fn is_registered(&self, schema: SchemaVersion) -> bool {
        self.decoders.contains_key(&schema.get())
    }

    pub fn registered_count(&self) -> usize {
        self.decoders.len()
    }

    /// Encodes a payload, returning its schema tag and opaque bytes.
    ///
    /// Encoding a shape that was never registered is refused: it would
    /// produce history this store cannot read back.
    pub fn encode(&self, payload: &dyn EventPayload) -> Result<(SchemaVersion, Vec<u8>)> {
        let schema = payload.schema();
        if !self.is_registered(schema) {
            return Err(Error::SchemaNotRegistered(schema));
        }
        let bytes = payload.encode()?;
        Ok((schema, bytes))
    }

    /// Decodes stored bytes by dispatching on the schema tag.
    pub fn decode(&self, schema: SchemaVersion, bytes: &[u8]) -> Result<Box<dyn EventPayload>> {
        let decode = self
            .decoders
            .get(&schema.get())
            .ok_or(Error::SchemaNotRegistered(schema))?;
        decode(bytes)
    }
}

/// Implements [`EventPayload`] and [`PayloadType`] for a concrete payload
/// struct, wiring encode/decode through the crate's rkyv helpers.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
/// #[rkyv(attr(derive(Debug)))]
/// pub struct AccountOpened { pub owner: String }
///
/// stratadb::payload_type!(AccountOpened, schema = 1);
/// ```
#[macro_export]
macro_rules! payload_type {
    ($ty:ty, schema = $schema:expr) => {
        impl $crate::codec::EventPayload for $ty {
            fn schema(&self) -> $crate::model::SchemaVersion {
                <$ty as $crate::codec::PayloadType>::SCHEMA
            }

            fn encode(&self) -> $crate::error::Result<Vec<u8>> {
                $crate::codec::serialize(self)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }

        impl $crate::codec::PayloadType for $ty {
            const SCHEMA: $crate::model::SchemaVersion = $crate::model::SchemaVersion($schema);

            fn decode(bytes: &[u8]) -> $crate::error::Result<Self> {
                $crate::codec::deserialize(bytes)
            }
        }
    };
}

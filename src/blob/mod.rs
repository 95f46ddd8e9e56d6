//! Data blobs - reference-counted byte buffers behind one capability
//!
//! Implementations:
//! - [`DataBlob`]: owned, growable buffer
//! - [`StringBlob`]: buffer initialized from text, truncated or zero padded
//! - [`ProxyBlob`]: read-only view of static bytes
//! - [`ProxyRefBlob`]: window into another blob, which it keeps alive

mod buffer;
mod proxy;


pub use buffer::{DataBlob, StringBlob, CLSID_DATA_BLOB, CLSID_STRING_BLOB};
pub use proxy::{ProxyBlob, ProxyRefBlob, CLSID_PROXY_BLOB, CLSID_PROXY_REF_BLOB};

use crate::guid::Guid;
use crate::object::{Factory, IObject, Interface};
use crate::ptr::AutoPtr;
use crate::status::{ObjectError, Result};
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use tracing::trace;

pub const IID_DATA_BLOB: Guid = crate::guid!("f578ff0d-abd2-4514-9d32-7cb454d4a73b");

/// Byte buffer capability
pub trait IDataBlob: IObject {
    /// Change the size; new bytes are zero
    fn resize(&self, new_size: usize) -> Result<()>;

    fn size(&self) -> usize;

    /// Shared view of the contents
    fn data(&self) -> BlobData<'_>;

    /// Exclusive view of the contents; `NotImplemented` for read-only blobs
    fn data_mut(&self) -> Result<BlobDataMut<'_>>;
}

impl Interface for dyn IDataBlob {
    const IID: Guid = IID_DATA_BLOB;
}

crate::related!(dyn IDataBlob => dyn IObject);
crate::related!(DataBlob => dyn IDataBlob);
crate::related!(StringBlob => dyn IDataBlob);
crate::related!(ProxyBlob => dyn IDataBlob);
crate::related!(ProxyRefBlob => dyn IDataBlob);

/// Shared access to blob contents
pub enum BlobData<'a> {
    Locked(MappedRwLockReadGuard<'a, [u8]>),
    Static(&'a [u8]),
}

/// Clamp `offset..offset + len` into `0..total`
fn window(total: usize, offset: usize, len: usize) -> std::ops::Range<usize> {
    let start = offset.min(total);
    let end = start.saturating_add(len).min(total);
    start..end
}

impl<'a> BlobData<'a> {
    /// Narrow the view to `offset..offset + len`, clamped to the contents
    pub fn slice(self, offset: usize, len: usize) -> BlobData<'a> {
        match self {
            Self::Locked(guard) => Self::Locked(MappedRwLockReadGuard::map(guard, |bytes| {
                let range = window(bytes.len(), offset, len);
                &bytes[range]
            })),
            Self::Static(bytes) => Self::Static(&bytes[window(bytes.len(), offset, len)]),
        }
    }
}

impl Deref for BlobData<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Locked(guard) => &**guard,
            Self::Static(bytes) => *bytes,
        }
    }
}

/// Exclusive access to blob contents
pub struct BlobDataMut<'a>(MappedRwLockWriteGuard<'a, [u8]>);

impl<'a> BlobDataMut<'a> {
    pub(crate) fn new(guard: MappedRwLockWriteGuard<'a, [u8]>) -> Self {
        Self(guard)
    }

    pub fn slice(self, offset: usize, len: usize) -> BlobDataMut<'a> {
        Self(MappedRwLockWriteGuard::map(self.0, |bytes| {
            let range = window(bytes.len(), offset, len);
            &mut bytes[range]
        }))
    }
}

impl Deref for BlobDataMut<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for BlobDataMut<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

fn into_blob<T: IDataBlob>(blob: AutoPtr<T>) -> AutoPtr<dyn IDataBlob> {
    blob.upcast(|b| b as &dyn IDataBlob)
}

/// Zero-filled blob of `size` bytes
pub fn create_blob(size: usize) -> Result<AutoPtr<dyn IDataBlob>> {
    let blob = Factory::new()
        .describe(crate::debug_info!("DataBlob"))
        .create(|init| Ok::<_, ObjectError>(DataBlob::new(init.into_base(), vec![0; size])))?;
    trace!(target: "blob", size, "blob created");
    Ok(into_blob(blob))
}

/// Blob holding a copy of `bytes`
pub fn create_blob_from(bytes: &[u8]) -> Result<AutoPtr<dyn IDataBlob>> {
    let blob = Factory::new()
        .describe(crate::debug_info!("DataBlob"))
        .create(|init| Ok::<_, ObjectError>(DataBlob::new(init.into_base(), bytes.to_vec())))?;
    trace!(target: "blob", size = bytes.len(), "blob created from bytes");
    Ok(into_blob(blob))
}

/// Zero-filled text blob of `size` bytes
pub fn create_string_blob(size: usize) -> Result<AutoPtr<dyn IDataBlob>> {
    create_string_blob_from(size, "")
}

/// Text blob of exactly `size` bytes: `text` truncated, or padded with zeros
pub fn create_string_blob_from(size: usize, text: &str) -> Result<AutoPtr<dyn IDataBlob>> {
    let blob = Factory::new()
        .describe(crate::debug_info!("StringBlob"))
        .create(|init| Ok::<_, ObjectError>(StringBlob::new(init.into_base(), size, text)))?;
    trace!(target: "blob", size, "string blob created");
    Ok(into_blob(blob))
}

/// Read-only blob over static bytes
pub fn create_proxy_blob(bytes: &'static [u8]) -> Result<AutoPtr<dyn IDataBlob>> {
    let blob = Factory::new()
        .describe(crate::debug_info!("ProxyBlob"))
        .create_strong(|init| Ok::<_, ObjectError>(ProxyBlob::new(init.into_base(), bytes)))?;
    trace!(target: "blob", size = bytes.len(), "proxy blob created");
    Ok(into_blob(blob))
}

/// Blob exposing `size` bytes of `source` starting at `offset`
///
/// Fails with `InvalidArgs` when the window does not fit inside `source`.
pub fn create_proxy_blob_from_source(
    source: &AutoPtr<dyn IDataBlob>,
    offset: usize,
    size: usize,
) -> Result<AutoPtr<dyn IDataBlob>> {
    if source.is_null() {
        return Err(ObjectError::InvalidArgs("proxy source is null".to_string()));
    }
    let available = source.size();
    if offset.checked_add(size).map_or(true, |end| end > available) {
        return Err(ObjectError::InvalidArgs(format!(
            "window {}+{} exceeds source size {}",
            offset, size, available
        )));
    }

    let blob = Factory::new()
        .describe(crate::debug_info!("ProxyRefBlob"))
        .create_strong(|init| {
            Ok::<_, ObjectError>(ProxyRefBlob::new(init.into_base(), source.clone(), offset, size))
        })?;
    trace!(target: "blob", offset, size, "proxy window created");
    Ok(into_blob(blob))
}

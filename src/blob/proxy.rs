//! Proxy blobs over memory owned elsewhere

use super::{BlobData, BlobDataMut, IDataBlob};
use crate::guid::Guid;
use crate::interface_entry;
use crate::object::{IObject, Interface, InterfaceEntry, InterfaceTable, ManagedObject, ObjectBase};
use crate::ptr::AutoPtr;
use crate::status::{ObjectError, Result};

pub const CLSID_PROXY_BLOB: Guid = crate::guid!("d1373bc6-c59a-40c5-ac46-56d299206d43");
pub const CLSID_PROXY_REF_BLOB: Guid = crate::guid!("8c2f4a71-3d5e-4b9a-a1f6-0e7d2c9b4f13");

/// Read-only view of static bytes; size and contents never change
pub struct ProxyBlob {
    base: ObjectBase,
    bytes: &'static [u8],
}

impl ProxyBlob {
    pub fn new(base: ObjectBase, bytes: &'static [u8]) -> Self {
        Self { base, bytes }
    }
}

impl Interface for ProxyBlob {
    const IID: Guid = CLSID_PROXY_BLOB;
}

impl InterfaceTable for ProxyBlob {
    const INTERFACES: &'static [InterfaceEntry<Self>] = &[
        interface_entry!(ProxyBlob => dyn IObject),
        interface_entry!(ProxyBlob => ProxyBlob),
        interface_entry!(ProxyBlob => dyn IDataBlob),
        InterfaceEntry::END,
    ];
}

impl ManagedObject for ProxyBlob {
    type Counter = ObjectBase;

    fn counter(&self) -> &ObjectBase {
        &self.base
    }
}

impl IDataBlob for ProxyBlob {
    fn resize(&self, _new_size: usize) -> Result<()> {
        Err(ObjectError::NotImplemented("resizing a proxy blob"))
    }

    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn data(&self) -> BlobData<'_> {
        BlobData::Static(self.bytes)
    }

    fn data_mut(&self) -> Result<BlobDataMut<'_>> {
        Err(ObjectError::NotImplemented("writing a proxy blob"))
    }
}

/// Fixed window into another blob
///
/// Holds a strong reference to the source, so the window stays readable
/// for as long as the proxy exists. Reads are clamped if the source shrinks.
pub struct ProxyRefBlob {
    base: ObjectBase,
    source: AutoPtr<dyn IDataBlob>,
    offset: usize,
    size: usize,
}

impl ProxyRefBlob {
    pub fn new(base: ObjectBase, source: AutoPtr<dyn IDataBlob>, offset: usize, size: usize) -> Self {
        Self { base, source, offset, size }
    }

    pub fn source(&self) -> &AutoPtr<dyn IDataBlob> {
        &self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Interface for ProxyRefBlob {
    const IID: Guid = CLSID_PROXY_REF_BLOB;
}

impl InterfaceTable for ProxyRefBlob {
    const INTERFACES: &'static [InterfaceEntry<Self>] = &[
        interface_entry!(ProxyRefBlob => dyn IObject),
        interface_entry!(ProxyRefBlob => ProxyRefBlob),
        interface_entry!(ProxyRefBlob => dyn IDataBlob),
        InterfaceEntry::END,
    ];
}

impl ManagedObject for ProxyRefBlob {
    type Counter = ObjectBase;

    fn counter(&self) -> &ObjectBase {
        &self.base
    }
}

impl IDataBlob for ProxyRefBlob {
    fn resize(&self, _new_size: usize) -> Result<()> {
        Err(ObjectError::NotImplemented("resizing a proxy blob"))
    }

    fn size(&self) -> usize {
        self.size
    }

    fn data(&self) -> BlobData<'_> {
        self.source.data().slice(self.offset, self.size)
    }

    fn data_mut(&self) -> Result<BlobDataMut<'_>> {
        Ok(self.source.data_mut()?.slice(self.offset, self.size))
    }
}

//! Owned blob buffers

use super::{BlobData, BlobDataMut, IDataBlob};
use crate::guid::Guid;
use crate::interface_entry;
use crate::object::{IObject, Interface, InterfaceEntry, InterfaceTable, ManagedObject, RefCountedBase};
use crate::status::Result;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const CLSID_DATA_BLOB: Guid = crate::guid!("405202ca-4daa-459c-9da8-6996ca3fb1d4");
pub const CLSID_STRING_BLOB: Guid = crate::guid!("2bf21355-9bf0-4ed4-b2e9-e5a45a25cfa2");

/// Growable byte buffer
pub struct DataBlob {
    base: RefCountedBase,
    bytes: RwLock<Vec<u8>>,
}

impl DataBlob {
    pub fn new(base: RefCountedBase, bytes: Vec<u8>) -> Self {
        Self { base, bytes: RwLock::new(bytes) }
    }
}

impl Interface for DataBlob {
    const IID: Guid = CLSID_DATA_BLOB;
}

impl InterfaceTable for DataBlob {
    const INTERFACES: &'static [InterfaceEntry<Self>] = &[
        interface_entry!(DataBlob => DataBlob),
        interface_entry!(DataBlob => dyn IDataBlob),
        InterfaceEntry::END,
    ];
}

impl ManagedObject for DataBlob {
    type Counter = RefCountedBase;

    fn counter(&self) -> &RefCountedBase {
        &self.base
    }
}

impl IDataBlob for DataBlob {
    fn resize(&self, new_size: usize) -> Result<()> {
        self.bytes.write().resize(new_size, 0);
        Ok(())
    }

    fn size(&self) -> usize {
        self.bytes.read().len()
    }

    fn data(&self) -> BlobData<'_> {
        BlobData::Locked(RwLockReadGuard::map(self.bytes.read(), |bytes| bytes.as_slice()))
    }

    fn data_mut(&self) -> Result<BlobDataMut<'_>> {
        Ok(BlobDataMut::new(RwLockWriteGuard::map(self.bytes.write(), |bytes| {
            bytes.as_mut_slice()
        })))
    }
}

/// Buffer initialized from text
///
/// Holds exactly the requested number of bytes. Text is copied up to its
/// first NUL; longer text is cut off and shorter text is followed by zeros.
pub struct StringBlob {
    base: RefCountedBase,
    text: RwLock<Vec<u8>>,
}

impl StringBlob {
    pub fn new(base: RefCountedBase, size: usize, text: &str) -> Self {
        let mut bytes = vec![0u8; size];
        let text = text.as_bytes();
        let len = text.iter().position(|&b| b == 0).unwrap_or(text.len());
        let copied = len.min(size);
        bytes[..copied].copy_from_slice(&text[..copied]);
        Self { base, text: RwLock::new(bytes) }
    }

    /// Contents up to the first zero byte, lossily decoded
    pub fn text(&self) -> String {
        let bytes = self.text.read();
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }
}

impl Interface for StringBlob {
    const IID: Guid = CLSID_STRING_BLOB;
}

impl InterfaceTable for StringBlob {
    const INTERFACES: &'static [InterfaceEntry<Self>] = &[
        interface_entry!(StringBlob => dyn IObject),
        interface_entry!(StringBlob => StringBlob),
        interface_entry!(StringBlob => dyn IDataBlob),
        InterfaceEntry::END,
    ];
}

impl ManagedObject for StringBlob {
    type Counter = RefCountedBase;

    fn counter(&self) -> &RefCountedBase {
        &self.base
    }
}

impl IDataBlob for StringBlob {
    fn resize(&self, new_size: usize) -> Result<()> {
        self.text.write().resize(new_size, 0);
        Ok(())
    }

    fn size(&self) -> usize {
        self.text.read().len()
    }

    fn data(&self) -> BlobData<'_> {
        BlobData::Locked(RwLockReadGuard::map(self.text.read(), |bytes| bytes.as_slice()))
    }

    fn data_mut(&self) -> Result<BlobDataMut<'_>> {
        Ok(BlobDataMut::new(RwLockWriteGuard::map(self.text.write(), |bytes| {
            bytes.as_mut_slice()
        })))
    }
}

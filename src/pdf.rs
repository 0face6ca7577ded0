//! Writing the font resources of a PDF file.
//!
//! The embedder does not own the document. It writes its objects through an `ObjectSink`, which
//! hands out object numbers and stores finished objects. A `lopdf::Document` is a sink, so fonts
//! and outlines can be added to a document that is saved with `Document::save_to`.

pub mod filter;
pub mod font;
pub mod outline;

use std::collections::btree_map::Entry;
use std::io;

use lopdf::{Document, Object, ObjectId};

/// Destination of the objects written by the embedder.
pub trait ObjectSink {
    /// Reserve the number of an object that will be written later.
    fn alloc_id(&mut self) -> ObjectId;

    /// Store the object reserved as `id`. Each id is written once.
    fn write_object(&mut self, id: ObjectId, object: Object) -> io::Result<()>;
}

impl ObjectSink for Document {
    fn alloc_id(&mut self) -> ObjectId {
        self.new_object_id()
    }

    fn write_object(&mut self, id: ObjectId, object: Object) -> io::Result<()> {
        if id.0 == 0 || id.0 > self.max_id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unallocated object id",
            ));
        }
        match self.objects.entry(id) {
            Entry::Occupied(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "object written twice",
            )),
            Entry::Vacant(entry) => {
                entry.insert(object);
                Ok(())
            }
        }
    }
}

//! CBOR serialization of tag sets and model parameters.

use std::io::{Read, Write};

use failure::Error;
use serde_cbor;

use crate::{ConvClassifier, TagSet};

pub trait CborRead
where
    Self: Sized,
{
    fn from_cbor_read<R>(read: R) -> Result<Self, Error>
    where
        R: Read;
}

macro_rules! cbor_read {
    ($type: ty) => {
        impl CborRead for $type {
            fn from_cbor_read<R>(read: R) -> Result<Self, Error>
            where
                R: Read,
            {
                let data = serde_cbor::from_reader(read)?;
                Ok(data)
            }
        }
    };
}

cbor_read!(TagSet);

impl CborRead for ConvClassifier {
    fn from_cbor_read<R>(read: R) -> Result<Self, Error>
    where
        R: Read,
    {
        let classifier: ConvClassifier = serde_cbor::from_reader(read)?;
        classifier.check_parameters()?;
        Ok(classifier)
    }
}

pub trait CborWrite {
    fn to_cbor_write<W>(&self, write: &mut W) -> Result<(), Error>
    where
        W: Write;
}

macro_rules! cbor_write {
    ($type: ty) => {
        impl CborWrite for $type {
            fn to_cbor_write<W>(&self, write: &mut W) -> Result<(), Error>
            where
                W: Write,
            {
                let data = serde_cbor::to_vec(self)?;
                write.write_all(&data)?;
                Ok(())
            }
        }
    };
}

cbor_write!(ConvClassifier);
cbor_write!(TagSet);

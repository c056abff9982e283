// SPDX-License-Identifier: GPL-3.0-only
/*
 * Copyright (c) 2025 Code Construct
 */
use core::mem;

use deku::{
    DekuError, DekuReader,
    ctx::Limit,
    deku_error,
    no_std_io::{self, Read, Seek},
    reader::Reader,
};

/// A counted list decoded into fixed capacity storage.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WireVec<T, const S: usize>(heapless::Vec<T, S>);

impl<T, const S: usize> WireVec<T, S> {
    pub fn new() -> Self {
        Self(heapless::Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, item: T) -> Result<(), T> {
        self.0.push(item)
    }

    pub fn as_slice(&self) -> &[T] {
        self.0.as_slice()
    }
}

fn read_counted<'a, T, Ctx, R: Read + Seek, const S: usize>(
    reader: &mut Reader<R>,
    count: usize,
    ctx: Ctx,
) -> Result<WireVec<T, S>, DekuError>
where
    T: DekuReader<'a, Ctx>,
    Ctx: Copy,
{
    if count > S {
        return Err(deku_error!(
            DekuError::InvalidParam,
            "Element count is larger than vector capacity",
            "{} exceeds {}",
            count,
            S
        ));
    }

    let mut res = WireVec::new();

    if mem::size_of::<T>() == 0 {
        return Ok(res);
    }

    for _ in 0..count {
        let val = <T>::from_reader_with_ctx(reader, ctx)?;
        if res.push(val).is_err() {
            return Err(deku_error!(
                DekuError::InvalidParam,
                "Failed to insert item into WireVec"
            ));
        }
    }

    Ok(res)
}

impl<'a, T, Ctx, Predicate, const S: usize> DekuReader<'a, (Limit<T, Predicate>, Ctx)>
    for WireVec<T, S>
where
    T: DekuReader<'a, Ctx>,
    Ctx: Copy,
    Predicate: FnMut(&T) -> bool,
{
    fn from_reader_with_ctx<R: no_std_io::Read + no_std_io::Seek>(
        reader: &mut Reader<R>,
        (limit, inner_ctx): (Limit<T, Predicate>, Ctx),
    ) -> Result<Self, DekuError>
    where
        Self: Sized,
    {
        match limit {
            Limit::Count(count) => read_counted(reader, count, inner_ctx),
            _ => Err(deku_error!(
                DekuError::InvalidParam,
                "WireVec only supports counted limits"
            )),
        }
    }
}

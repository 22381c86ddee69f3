use crate::arch::RegisterType;

/// Byte layout of a register file: where each register lives in the flat
/// buffer and how wide it is.
///
/// Immutable once built; every cache of an architecture shares one.
#[derive(Clone, Debug, PartialEq)]
pub struct RegisterDescriptor {
    raw_count: usize,
    cooked_count: usize,
    offsets: Vec<usize>,
    sizes: Vec<usize>,
    types: Vec<RegisterType>,
    max_size: usize,
    /// Bytes needed to hold every raw register.
    raw_buffer_size: usize,
    legacy: bool,
}

impl RegisterDescriptor {
    /// Pack registers back to back in register-number order.
    pub fn build(
        raw_count: usize,
        pseudo_count: usize,
        type_of: impl Fn(usize) -> RegisterType,
    ) -> Self {
        let cooked_count = raw_count + pseudo_count;
        let mut desc = Self::empty(raw_count, cooked_count);

        let mut running = 0;
        for i in 0..cooked_count {
            let ty = type_of(i);
            let size = ty.byte_width();
            desc.push(ty, running, size);
            running += size;
            if i + 1 == raw_count {
                desc.raw_buffer_size = running;
            }
        }

        desc
    }

    /// Deprecated: raw registers sit at caller-supplied offsets, which may
    /// overlap. Pseudo registers are still packed, after the furthest raw byte.
    pub fn build_legacy(
        raw_count: usize,
        pseudo_count: usize,
        type_of: impl Fn(usize) -> RegisterType,
        offset_of: impl Fn(usize) -> usize,
    ) -> Self {
        let cooked_count = raw_count + pseudo_count;
        let mut desc = Self::empty(raw_count, cooked_count);
        desc.legacy = true;

        for i in 0..raw_count {
            let ty = type_of(i);
            let (offset, size) = (offset_of(i), ty.byte_width());
            desc.push(ty, offset, size);
            desc.raw_buffer_size = desc.raw_buffer_size.max(offset + size);
        }

        let mut running = desc.raw_buffer_size;
        for i in raw_count..cooked_count {
            let ty = type_of(i);
            let size = ty.byte_width();
            desc.push(ty, running, size);
            running += size;
        }

        desc
    }

    fn empty(raw_count: usize, cooked_count: usize) -> Self {
        Self {
            raw_count,
            cooked_count,
            offsets: Vec::with_capacity(cooked_count),
            sizes: Vec::with_capacity(cooked_count),
            types: Vec::with_capacity(cooked_count),
            max_size: 0,
            raw_buffer_size: 0,
            legacy: false,
        }
    }

    fn push(&mut self, ty: RegisterType, offset: usize, size: usize) {
        self.types.push(ty);
        self.offsets.push(offset);
        self.sizes.push(size);
        self.max_size = self.max_size.max(size);
    }

    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    pub fn cooked_count(&self) -> usize {
        self.cooked_count
    }

    pub fn offset(&self, regnum: usize) -> usize {
        self.offsets[regnum]
    }

    pub fn size(&self, regnum: usize) -> usize {
        self.sizes[regnum]
    }

    pub fn register_type(&self, regnum: usize) -> RegisterType {
        self.types[regnum]
    }

    /// Width of the widest register, raw or pseudo.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn raw_buffer_size(&self) -> usize {
        self.raw_buffer_size
    }

    /// Whether raw offsets came from [`RegisterDescriptor::build_legacy`].
    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Byte range of `regnum` within the raw buffer.
    pub(crate) fn span(&self, regnum: usize) -> std::ops::Range<usize> {
        let offset = self.offsets[regnum];
        offset..offset + self.sizes[regnum]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RegisterType::*;

    #[test]
    fn offsets_are_cumulative() {
        let types = [Uint32, Uint64, Uint8, Vec128];
        let desc = RegisterDescriptor::build(3, 1, |i| types[i]);

        assert_eq!(desc.cooked_count(), 4);
        assert_eq!(
            (0..4).map(|i| desc.offset(i)).collect::<Vec<_>>(),
            vec![0, 4, 12, 13]
        );
        assert_eq!(desc.raw_buffer_size(), 13);
        assert_eq!(desc.max_size(), 16);
        for i in 0..3 {
            assert!(desc.offset(i + 1) >= desc.offset(i) + desc.size(i));
        }
    }

    #[test]
    fn no_raw_registers_means_empty_buffer() {
        let desc = RegisterDescriptor::build(0, 2, |_| Uint16);

        assert_eq!(desc.raw_buffer_size(), 0);
        assert_eq!(desc.offset(0), 0);
        assert_eq!(desc.offset(1), 2);
    }

    #[test]
    fn zero_width_types_are_degenerate_but_valid() {
        let desc = RegisterDescriptor::build(2, 0, |_| Void);

        assert_eq!(desc.max_size(), 0);
        assert_eq!(desc.raw_buffer_size(), 0);
        assert_eq!(desc.span(1), 0..0);
    }

    #[test]
    fn legacy_layout_may_overlap() {
        let offsets = [0, 4, 0];
        let desc =
            RegisterDescriptor::build_legacy(3, 1, |i| if i == 2 { Uint64 } else { Uint32 }, |i| {
                offsets[i]
            });

        assert!(desc.is_legacy());
        assert_eq!(desc.span(2), 0..8);
        assert_eq!(desc.raw_buffer_size(), 8);
        // pseudo registers still packed after the raw area
        assert_eq!(desc.offset(3), 8);
    }
}

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};

use super::ProgramId;

/// Largest uniform block a program may declare, in bytes.
pub const MAX_UNIFORM_BLOCK_SIZE: u32 = 256;

/// Type of a settable uniform block member.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl UniformKind {
    /// Bytes occupied in the block (`mat3x3` columns are padded to 16 bytes).
    pub fn size(self) -> u32 {
        match self {
            UniformKind::Float | UniformKind::Int | UniformKind::UInt => 4,
            UniformKind::Vec2 => 8,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat3 => 48,
            UniformKind::Mat4 => 64,
        }
    }
}

/// A value written into a program's uniform block.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat3(Mat3),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::UInt(_) => UniformKind::UInt,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat3(_) => UniformKind::Mat3,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// Writes the WGSL uniform-layout bytes. `dst.len()` must equal `kind().size()`.
    fn write_to(&self, dst: &mut [u8]) {
        match self {
            UniformValue::Float(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::UInt(v) => dst.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => dst.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec3(v) => dst.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Vec4(v) => dst.copy_from_slice(bytemuck::cast_slice(&v.to_array())),
            UniformValue::Mat3(m) => {
                for (i, col) in m.to_cols_array_2d().iter().enumerate() {
                    let start = i * 16;
                    dst[start..start + 12].copy_from_slice(bytemuck::cast_slice(col));
                    dst[start + 12..start + 16].fill(0);
                }
            }
            UniformValue::Mat4(m) => dst.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array())),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::UInt(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat3> for UniformValue {
    fn from(m: Mat3) -> Self {
        UniformValue::Mat3(m)
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m)
    }
}

/// One named member of a uniform block.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

/// Reflected layout of a program's `@group(0) @binding(0)` uniform block.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct UniformBlock {
    size: u32,
    members: Vec<UniformMember>,
}

impl UniformBlock {
    pub fn new(size: u32, members: Vec<UniformMember>) -> Self {
        Self { size, members }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn members(&self) -> &[UniformMember] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Resolved uniform slot, valid only for the program it was queried from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub offset: u32,
    pub kind: UniformKind,
}

/// Why a uniform write was rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum UniformWriteError {
    TypeMismatch { expected: UniformKind, got: UniformKind },
    OutOfBounds,
}

/// CPU copy of one program's uniform block.
///
/// Values persist across draws until overwritten; each draw snapshots `bytes()`.
#[derive(Debug, Clone, Default)]
pub(crate) struct UniformStorage {
    block: Option<UniformBlock>,
    bytes: Vec<u8>,
}

impl UniformStorage {
    pub(crate) fn new(block: Option<UniformBlock>) -> Self {
        let size = block.as_ref().map_or(0, |b| b.size() as usize);
        Self {
            block,
            bytes: vec![0; size],
        }
    }

    pub(crate) fn location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let member = self.block.as_ref()?.member(name)?;
        Some(UniformLocation {
            program,
            offset: member.offset,
            kind: member.kind,
        })
    }

    pub(crate) fn write(
        &mut self,
        location: &UniformLocation,
        value: &UniformValue,
    ) -> Result<(), UniformWriteError> {
        if value.kind() != location.kind {
            return Err(UniformWriteError::TypeMismatch {
                expected: location.kind,
                got: value.kind(),
            });
        }
        let start = location.offset as usize;
        let end = start + location.kind.size() as usize;
        let dst = self
            .bytes
            .get_mut(start..end)
            .ok_or(UniformWriteError::OutOfBounds)?;
        value.write_to(dst);
        Ok(())
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Per-draw uniform snapshots packed at a fixed stride, one slot per draw.
///
/// The stride is the dynamic-offset step of the uniform ring, so slot `n`
/// is bound at byte offset `n * stride`.
#[derive(Debug, Clone)]
pub(crate) struct UniformSlots {
    stride: u32,
    bytes: Vec<u8>,
}

impl UniformSlots {
    /// `stride` is clamped up to [`MAX_UNIFORM_BLOCK_SIZE`].
    pub(crate) fn new(stride: u32) -> Self {
        Self {
            stride: stride.max(MAX_UNIFORM_BLOCK_SIZE),
            bytes: Vec::new(),
        }
    }

    /// Appends a slot holding `block` and returns its index.
    pub(crate) fn push(&mut self, block: &[u8]) -> u32 {
        let slot = self.len();
        let stride = self.stride as usize;
        let start = slot as usize * stride;
        self.bytes.resize(start + stride, 0);
        let n = block.len().min(stride);
        self.bytes[start..start + n].copy_from_slice(&block[..n]);
        slot
    }

    pub(crate) fn offset(&self, slot: u32) -> u32 {
        slot * self.stride
    }

    pub(crate) fn stride(&self) -> u32 {
        self.stride
    }

    pub(crate) fn len(&self) -> u32 {
        (self.bytes.len() / self.stride as usize) as u32
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn clear(&mut self) {
        self.bytes.clear();
    }
}

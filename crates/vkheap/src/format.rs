//! Backend independent texture formats and their Vulkan counterparts.
//!
//! The mapping is a plain `const` table indexed by the [GraphicsFormat] ordinal. It is never mutated, so it needs no
//! locking. Its length is checked against the number of formats at compile time.

use ash::vk::Format as VKF;
use static_assertions::const_assert_eq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsFormat {
    #[default]
    Unknown,
    R8Unorm,
    R8Snorm,
    R8Uint,
    R8Sint,
    R16Unorm,
    R16Uint,
    R16Float,
    R32Uint,
    R32Sint,
    R32Float,
    Rg8Unorm,
    Rg16Float,
    Rg32Float,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba8Uint,
    Rgb10a2Unorm,
    Rg11b10Ufloat,
    Rgba16Unorm,
    Rgba16Float,
    Rgba32Uint,
    Rgba32Float,
    Depth16Unorm,
    Depth24UnormStencil8,
    Depth32Float,
    Depth32FloatStencil8,
    Bc1RgbaUnorm,
    Bc3RgbaUnorm,
    Bc7RgbaUnorm,
}

///Vulkan format of each [GraphicsFormat], in declaration order.
pub const FORMAT_TABLE: [VKF; 32] = [
    VKF::UNDEFINED,
    VKF::R8_UNORM,
    VKF::R8_SNORM,
    VKF::R8_UINT,
    VKF::R8_SINT,
    VKF::R16_UNORM,
    VKF::R16_UINT,
    VKF::R16_SFLOAT,
    VKF::R32_UINT,
    VKF::R32_SINT,
    VKF::R32_SFLOAT,
    VKF::R8G8_UNORM,
    VKF::R16G16_SFLOAT,
    VKF::R32G32_SFLOAT,
    VKF::R8G8B8A8_UNORM,
    VKF::R8G8B8A8_SRGB,
    VKF::B8G8R8A8_UNORM,
    VKF::B8G8R8A8_SRGB,
    VKF::R8G8B8A8_UINT,
    VKF::A2B10G10R10_UNORM_PACK32,
    VKF::B10G11R11_UFLOAT_PACK32,
    VKF::R16G16B16A16_UNORM,
    VKF::R16G16B16A16_SFLOAT,
    VKF::R32G32B32A32_UINT,
    VKF::R32G32B32A32_SFLOAT,
    VKF::D16_UNORM,
    VKF::D24_UNORM_S8_UINT,
    VKF::D32_SFLOAT,
    VKF::D32_SFLOAT_S8_UINT,
    VKF::BC1_RGBA_UNORM_BLOCK,
    VKF::BC3_UNORM_BLOCK,
    VKF::BC7_UNORM_BLOCK,
];

const_assert_eq!(FORMAT_TABLE.len(), GraphicsFormat::COUNT);
const_assert_eq!(GraphicsFormat::Bc7RgbaUnorm as usize + 1, GraphicsFormat::COUNT);

impl GraphicsFormat {
    pub const ALL: [GraphicsFormat; 32] = [
        GraphicsFormat::Unknown,
        GraphicsFormat::R8Unorm,
        GraphicsFormat::R8Snorm,
        GraphicsFormat::R8Uint,
        GraphicsFormat::R8Sint,
        GraphicsFormat::R16Unorm,
        GraphicsFormat::R16Uint,
        GraphicsFormat::R16Float,
        GraphicsFormat::R32Uint,
        GraphicsFormat::R32Sint,
        GraphicsFormat::R32Float,
        GraphicsFormat::Rg8Unorm,
        GraphicsFormat::Rg16Float,
        GraphicsFormat::Rg32Float,
        GraphicsFormat::Rgba8Unorm,
        GraphicsFormat::Rgba8UnormSrgb,
        GraphicsFormat::Bgra8Unorm,
        GraphicsFormat::Bgra8UnormSrgb,
        GraphicsFormat::Rgba8Uint,
        GraphicsFormat::Rgb10a2Unorm,
        GraphicsFormat::Rg11b10Ufloat,
        GraphicsFormat::Rgba16Unorm,
        GraphicsFormat::Rgba16Float,
        GraphicsFormat::Rgba32Uint,
        GraphicsFormat::Rgba32Float,
        GraphicsFormat::Depth16Unorm,
        GraphicsFormat::Depth24UnormStencil8,
        GraphicsFormat::Depth32Float,
        GraphicsFormat::Depth32FloatStencil8,
        GraphicsFormat::Bc1RgbaUnorm,
        GraphicsFormat::Bc3RgbaUnorm,
        GraphicsFormat::Bc7RgbaUnorm,
    ];

    pub const COUNT: usize = Self::ALL.len();

    ///Maps to the Vulkan format. Does not check whether a device supports it.
    pub const fn to_vk(self) -> VKF {
        FORMAT_TABLE[self as usize]
    }

    ///Reverse lookup. Formats without a counterpart map to [GraphicsFormat::Unknown].
    pub fn from_vk(format: VKF) -> GraphicsFormat {
        FORMAT_TABLE
            .iter()
            .position(|f| *f == format)
            .map(|i| Self::ALL[i])
            .unwrap_or(GraphicsFormat::Unknown)
    }

    ///Size in bytes of one texel, or of one 4x4 block for block compressed formats.
    pub const fn bytes_per_texel(self) -> u32 {
        use GraphicsFormat::*;
        match self {
            Unknown => 0,
            R8Unorm | R8Snorm | R8Uint | R8Sint => 1,
            R16Unorm | R16Uint | R16Float | Rg8Unorm | Depth16Unorm => 2,
            R32Uint | R32Sint | R32Float | Rg16Float | Rgba8Unorm | Rgba8UnormSrgb
            | Bgra8Unorm | Bgra8UnormSrgb | Rgba8Uint | Rgb10a2Unorm | Rg11b10Ufloat
            | Depth24UnormStencil8 | Depth32Float => 4,
            Rg32Float | Rgba16Unorm | Rgba16Float | Depth32FloatStencil8 | Bc1RgbaUnorm => 8,
            Rgba32Uint | Rgba32Float | Bc3RgbaUnorm | Bc7RgbaUnorm => 16,
        }
    }

    pub const fn is_block_compressed(self) -> bool {
        matches!(
            self,
            GraphicsFormat::Bc1RgbaUnorm | GraphicsFormat::Bc3RgbaUnorm | GraphicsFormat::Bc7RgbaUnorm
        )
    }

    pub const fn is_depth_stencil(self) -> bool {
        matches!(
            self,
            GraphicsFormat::Depth16Unorm
                | GraphicsFormat::Depth24UnormStencil8
                | GraphicsFormat::Depth32Float
                | GraphicsFormat::Depth32FloatStencil8
        )
    }

    ///Bytes needed for a `width` x `height` texture of this format. Block compressed formats are rounded up to whole blocks.
    pub const fn texture_size_in_bytes(self, width: u32, height: u32) -> u64 {
        let (w, h) = if self.is_block_compressed() {
            (width.div_ceil(4), height.div_ceil(4))
        } else {
            (width, height)
        };
        w as u64 * h as u64 * self.bytes_per_texel() as u64
    }
}

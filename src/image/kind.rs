use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

/// The closed set of boot image formats the loader recognises.
///
/// Classification is total: anything without a recognised signature is [`ImageKind::Binary`].
///
/// # Examples
///
/// ```rust
/// use guestimage::ImageKind;
/// use strum::IntoEnumIterator;
///
/// let modules: Vec<_> = ImageKind::iter().filter(|kind| kind.is_module()).collect();
/// assert_eq!(modules, [ImageKind::DeviceTree, ImageKind::InitrdGz]);
/// assert_eq!(ImageKind::ZImage.to_string(), "zImage");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, IntoStaticStr,
)]
pub enum ImageKind {
    /// ELF executable
    #[strum(to_string = "ELF")]
    Elf,
    /// Self-decompressing ARM kernel (`zImage`)
    #[strum(to_string = "zImage")]
    ZImage,
    /// Legacy U-Boot wrapped kernel (`uImage`)
    #[strum(to_string = "uImage")]
    UImage,
    /// Flattened device tree blob
    #[strum(to_string = "DTB")]
    DeviceTree,
    /// gzip-compressed initial ramdisk
    #[strum(to_string = "initrd.gz")]
    InitrdGz,
    /// Raw binary, no recognised signature
    #[strum(to_string = "binary")]
    Binary,
}

impl ImageKind {
    /// Returns `true` if images of this kind can be loaded as the guest kernel.
    #[must_use]
    pub fn is_kernel(self) -> bool {
        matches!(self, ImageKind::Binary | ImageKind::ZImage)
    }

    /// Returns `true` if images of this kind can be loaded as a boot module.
    #[must_use]
    pub fn is_module(self) -> bool {
        matches!(self, ImageKind::DeviceTree | ImageKind::InitrdGz)
    }
}

/// Which of the two loader entry points an image is placed through.
///
/// The two contexts accept disjoint sets of [`ImageKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum LoadContext {
    /// The guest kernel
    Kernel,
    /// A device tree or initial ramdisk handed to the kernel
    Module,
}

impl LoadContext {
    /// Returns `true` if `kind` may be loaded in this context.
    #[must_use]
    pub fn accepts(self, kind: ImageKind) -> bool {
        match self {
            LoadContext::Kernel => kind.is_kernel(),
            LoadContext::Module => kind.is_module(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn contexts_are_disjoint() {
        for kind in ImageKind::iter() {
            assert!(
                !(LoadContext::Kernel.accepts(kind) && LoadContext::Module.accepts(kind)),
                "{kind} accepted by both contexts"
            );
        }
    }

    #[test]
    fn elf_and_uimage_are_never_loadable() {
        for context in LoadContext::iter() {
            assert!(!context.accepts(ImageKind::Elf));
            assert!(!context.accepts(ImageKind::UImage));
        }
    }

    #[test]
    fn names() {
        assert_eq!(ImageKind::COUNT, 6);
        assert_eq!(ImageKind::DeviceTree.to_string(), "DTB");
        assert_eq!(<&'static str>::from(ImageKind::InitrdGz), "initrd.gz");
        assert_eq!(LoadContext::Kernel.to_string(), "kernel");
        assert_eq!(LoadContext::Module.to_string(), "module");
    }
}

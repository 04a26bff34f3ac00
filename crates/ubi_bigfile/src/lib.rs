//! This library handles reading, resolving and creating the **M4B** big files used by *Myst IV: Revelation*.
//!
//! # M4B Big File Format Documentation
//!
//! A big file packs a tree of directories and files into a single blob. The metadata (header,
//! directories and file entries) comes first, followed by the data of every file. Big files are
//! identified with the `.m4b` extension and are frequently nested: a file of a big file can itself
//! be a big file.
//!
//! ## File Structure
//!
//! ### Strings
//!
//! Every string is stored with a size prefix. A size of 0 means the string is absent.
//!
//! | Offset (bytes) | Field  | Description                                                       |
//! |----------------|--------|-------------------------------------------------------------------|
//! | 0x0000         | Size   | 4 bytes: Number of bytes that follow, 0 when absent               |
//! | 0x0004         | Bytes  | Size bytes: The characters, usually ending with a NUL terminator  |
//!
//! Names stored inside resources are **encrypted**: every byte has its adjacent bit pairs exchanged.
//! The transform is its own inverse.
//!
//! ### Header
//!
//! | Offset (bytes) | Field     | Description                                            |
//! |----------------|-----------|--------------------------------------------------------|
//! | 0x0000         | Signature | String: `"UBI_BF_SIG"` with terminator (size 11)       |
//! | 0x000F         | Version   | 4 bytes: Fixed value `1`                               |
//!
//! Any other signature or version is rejected before the tree is read.
//!
//! ### Directory
//!
//! | Field            | Description                                                        |
//! |------------------|--------------------------------------------------------------------|
//! | Name             | String: Name of the directory, absent for a wildcard directory     |
//! | Directory Count  | 1 byte: Number of child directories                                |
//! | Directories      | The child directories                                              |
//! | File Count       | 4 bytes: Number of files                                           |
//! | Files            | The file entries                                                   |
//!
//! A directory without a name matches any name when a path is looked up. The root directory is
//! usually unnamed, so lookup paths start with a component standing for it.
//!
//! ### File
//!
//! | Field    | Description                                                           |
//! |----------|-----------------------------------------------------------------------|
//! | Name     | String: Name of the file                                              |
//! | Size     | 4 bytes: Size of the data                                             |
//! | Position | 4 bytes: Offset of the data from the start of the containing big file |
//!
//! Several entries may share a position, in which case they share their data.
//!
//! ### Resources
//!
//! Files with the `.bin` extension carry a resource record:
//!
//! | Offset (bytes) | Field      | Description                                        |
//! |----------------|------------|----------------------------------------------------|
//! | 0x0000         | Signature  | 4 bytes: `"B0_L"`                                  |
//! | 0x0004         | Identifier | 4 bytes: Kind of resource                          |
//! | 0x0008         | Version    | 4 bytes: Version of the resource                   |
//! | 0x000C         | Name       | Encrypted string: Name of the resource             |
//!
//! The body depends on the identifier. Texture boxes found under `cube` declare layer files,
//! water records found under `water` bind an atlas to mask archives. Mask archives hold one run
//! length encoded mask per cube face, telling which slices of the face are blended water overlays.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.m4b`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Resources**: `.bin`
//! - **Images**: `.png`, `.jpg`, `.jtif`, `.zap`
//!

pub mod error;
pub mod guard;
pub mod layout;
pub mod path;
pub mod profile;
pub mod read;
pub mod resolve;
pub mod resource;
pub mod rle;
pub mod string;
pub mod types;
pub mod write;

pub use layout::Layout;
pub use path::Path;
pub use profile::FormatProfile;
pub use read::{BigFile, Directory, File};
pub use resolve::Resolution;
pub use write::BigFileWriter;

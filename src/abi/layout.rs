//! FUSE ABI structure layouts.
//!
//! Each kernel structure is described field by field so it can be decoded
//! from any byte order without pointer casts. All structures carry their own
//! explicit padding in the kernel header, so the packed size of a layout is
//! the C `sizeof`.

#![allow(missing_docs)]

use std::fmt;

/// Primitive field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    U16,
    U32,
    U64,
    I32,
    I64,
}

impl Scalar {
    pub const fn size(self) -> usize {
        match self {
            Scalar::U16 => 2,
            Scalar::U32 | Scalar::I32 => 4,
            Scalar::U64 | Scalar::I64 => 8,
        }
    }
}

/// Type of a structure field.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Scalar(Scalar),
    Array(Scalar, usize),
    Struct(&'static Layout),
}

impl FieldType {
    pub const fn size(&self) -> usize {
        match self {
            FieldType::Scalar(s) => s.size(),
            FieldType::Array(s, n) => s.size() * *n,
            FieldType::Struct(layout) => layout.size(),
        }
    }
}

/// Named, ordered field list of a kernel structure.
#[derive(Debug)]
pub struct Layout {
    pub name: &'static str,
    pub fields: &'static [(&'static str, FieldType)],
}

impl Layout {
    /// Size in bytes on the wire.
    pub const fn size(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].1.size();
            i += 1;
        }
        total
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scalar::U16 => "u16",
            Scalar::U32 => "u32",
            Scalar::U64 => "u64",
            Scalar::I32 => "i32",
            Scalar::I64 => "i64",
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Scalar(s) => write!(f, "{s}"),
            FieldType::Array(s, n) => write!(f, "[{s}; {n}]"),
            FieldType::Struct(layout) => f.write_str(layout.name),
        }
    }
}

/// Definition form: `Attr {Ino:u64 Size:u64 ...}`.
impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (i, (name, ty)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{name}:{ty}")?;
        }
        f.write_str("}")
    }
}

const U16: FieldType = FieldType::Scalar(Scalar::U16);
const U32: FieldType = FieldType::Scalar(Scalar::U32);
const U64: FieldType = FieldType::Scalar(Scalar::U64);
const I32: FieldType = FieldType::Scalar(Scalar::I32);
const I64: FieldType = FieldType::Scalar(Scalar::I64);

pub const ATTR: Layout = Layout {
    name: "Attr",
    fields: &[
        ("Ino", U64),
        ("Size", U64),
        ("Blocks", U64),
        ("Atime", U64),
        ("Mtime", U64),
        ("Ctime", U64),
        ("Atimensec", U32),
        ("Mtimensec", U32),
        ("Ctimensec", U32),
        ("Mode", U32),
        ("Nlink", U32),
        ("Uid", U32),
        ("Gid", U32),
        ("Rdev", U32),
        ("Blksize", U32),
        ("Padding", U32),
    ],
};

pub const KSTATFS: Layout = Layout {
    name: "Kstatfs",
    fields: &[
        ("Blocks", U64),
        ("Bfree", U64),
        ("Bavail", U64),
        ("Files", U64),
        ("Ffree", U64),
        ("Bsize", U32),
        ("Namelen", U32),
        ("Frsize", U32),
        ("Padding", U32),
        ("Spare", FieldType::Array(Scalar::U32, 6)),
    ],
};

pub const FILE_LOCK: Layout = Layout {
    name: "FileLock",
    fields: &[("Start", U64), ("End", U64), ("Type", U32), ("Pid", U32)],
};

pub const ENTRY_OUT: Layout = Layout {
    name: "EntryOut",
    fields: &[
        ("Nodeid", U64),
        ("Generation", U64),
        ("EntryValid", U64),
        ("AttrValid", U64),
        ("EntryValidNsec", U32),
        ("AttrValidNsec", U32),
        ("Attr", FieldType::Struct(&ATTR)),
    ],
};

pub const FORGET_IN: Layout = Layout {
    name: "ForgetIn",
    fields: &[("Nlookup", U64)],
};

pub const FORGET_ONE: Layout = Layout {
    name: "ForgetOne",
    fields: &[("Nodeid", U64), ("Nlookup", U64)],
};

pub const BATCH_FORGET_IN: Layout = Layout {
    name: "BatchForgetIn",
    fields: &[("Count", U32), ("Dummy", U32)],
};

pub const GETATTR_IN: Layout = Layout {
    name: "GetattrIn",
    fields: &[("GetattrFlags", U32), ("Dummy", U32), ("Fh", U64)],
};

pub const ATTR_OUT: Layout = Layout {
    name: "AttrOut",
    fields: &[
        ("AttrValid", U64),
        ("AttrValidNsec", U32),
        ("Dummy", U32),
        ("Attr", FieldType::Struct(&ATTR)),
    ],
};

pub const MKNOD_IN: Layout = Layout {
    name: "MknodIn",
    fields: &[("Mode", U32), ("Rdev", U32), ("Umask", U32), ("Padding", U32)],
};

pub const MKDIR_IN: Layout = Layout {
    name: "MkdirIn",
    fields: &[("Mode", U32), ("Umask", U32)],
};

pub const RENAME_IN: Layout = Layout {
    name: "RenameIn",
    fields: &[("Newdir", U64)],
};

pub const RENAME2_IN: Layout = Layout {
    name: "Rename2In",
    fields: &[("Newdir", U64), ("Flags", U32), ("Padding", U32)],
};

pub const LINK_IN: Layout = Layout {
    name: "LinkIn",
    fields: &[("Oldnodeid", U64)],
};

pub const SETATTR_IN: Layout = Layout {
    name: "SetattrIn",
    fields: &[
        ("Valid", U32),
        ("Padding", U32),
        ("Fh", U64),
        ("Size", U64),
        ("LockOwner", U64),
        ("Atime", U64),
        ("Mtime", U64),
        ("Ctime", U64),
        ("Atimensec", U32),
        ("Mtimensec", U32),
        ("Ctimensec", U32),
        ("Mode", U32),
        ("Unused4", U32),
        ("Uid", U32),
        ("Gid", U32),
        ("Unused5", U32),
    ],
};

pub const OPEN_IN: Layout = Layout {
    name: "OpenIn",
    fields: &[("Flags", U32), ("Unused", U32)],
};

pub const CREATE_IN: Layout = Layout {
    name: "CreateIn",
    fields: &[("Flags", U32), ("Mode", U32), ("Umask", U32), ("Padding", U32)],
};

pub const OPEN_OUT: Layout = Layout {
    name: "OpenOut",
    fields: &[("Fh", U64), ("OpenFlags", U32), ("Padding", U32)],
};

pub const RELEASE_IN: Layout = Layout {
    name: "ReleaseIn",
    fields: &[
        ("Fh", U64),
        ("Flags", U32),
        ("ReleaseFlags", U32),
        ("LockOwner", U64),
    ],
};

pub const FLUSH_IN: Layout = Layout {
    name: "FlushIn",
    fields: &[
        ("Fh", U64),
        ("Unused", U32),
        ("Padding", U32),
        ("LockOwner", U64),
    ],
};

pub const READ_IN: Layout = Layout {
    name: "ReadIn",
    fields: &[
        ("Fh", U64),
        ("Offset", U64),
        ("Size", U32),
        ("ReadFlags", U32),
        ("LockOwner", U64),
        ("Flags", U32),
        ("Padding", U32),
    ],
};

pub const WRITE_IN: Layout = Layout {
    name: "WriteIn",
    fields: &[
        ("Fh", U64),
        ("Offset", U64),
        ("Size", U32),
        ("WriteFlags", U32),
        ("LockOwner", U64),
        ("Flags", U32),
        ("Padding", U32),
    ],
};

pub const WRITE_OUT: Layout = Layout {
    name: "WriteOut",
    fields: &[("Size", U32), ("Padding", U32)],
};

pub const STATFS_OUT: Layout = Layout {
    name: "StatfsOut",
    fields: &[("St", FieldType::Struct(&KSTATFS))],
};

pub const FSYNC_IN: Layout = Layout {
    name: "FsyncIn",
    fields: &[("Fh", U64), ("FsyncFlags", U32), ("Padding", U32)],
};

pub const SETXATTR_IN: Layout = Layout {
    name: "SetxattrIn",
    fields: &[("Size", U32), ("Flags", U32)],
};

pub const GETXATTR_IN: Layout = Layout {
    name: "GetxattrIn",
    fields: &[("Size", U32), ("Padding", U32)],
};

pub const GETXATTR_OUT: Layout = Layout {
    name: "GetxattrOut",
    fields: &[("Size", U32), ("Padding", U32)],
};

pub const LK_IN: Layout = Layout {
    name: "LkIn",
    fields: &[
        ("Fh", U64),
        ("Owner", U64),
        ("Lk", FieldType::Struct(&FILE_LOCK)),
        ("LkFlags", U32),
        ("Padding", U32),
    ],
};

pub const LK_OUT: Layout = Layout {
    name: "LkOut",
    fields: &[("Lk", FieldType::Struct(&FILE_LOCK))],
};

pub const ACCESS_IN: Layout = Layout {
    name: "AccessIn",
    fields: &[("Mask", U32), ("Padding", U32)],
};

pub const INIT_IN: Layout = Layout {
    name: "InitIn",
    fields: &[
        ("Major", U32),
        ("Minor", U32),
        ("MaxReadahead", U32),
        ("Flags", U32),
    ],
};

pub const INIT_OUT: Layout = Layout {
    name: "InitOut",
    fields: &[
        ("Major", U32),
        ("Minor", U32),
        ("MaxReadahead", U32),
        ("Flags", U32),
        ("MaxBackground", U16),
        ("CongestionThreshold", U16),
        ("MaxWrite", U32),
        ("TimeGran", U32),
        ("MaxPages", U16),
        ("MapAlignment", U16),
        ("Unused", FieldType::Array(Scalar::U32, 8)),
    ],
};

pub const INTERRUPT_IN: Layout = Layout {
    name: "InterruptIn",
    fields: &[("Unique", U64)],
};

pub const BMAP_IN: Layout = Layout {
    name: "BmapIn",
    fields: &[("Block", U64), ("Blocksize", U32), ("Padding", U32)],
};

pub const BMAP_OUT: Layout = Layout {
    name: "BmapOut",
    fields: &[("Block", U64)],
};

pub const IOCTL_IN: Layout = Layout {
    name: "IoctlIn",
    fields: &[
        ("Fh", U64),
        ("Flags", U32),
        ("Cmd", U32),
        ("Arg", U64),
        ("InSize", U32),
        ("OutSize", U32),
    ],
};

pub const IOCTL_OUT: Layout = Layout {
    name: "IoctlOut",
    fields: &[
        ("Result", I32),
        ("Flags", U32),
        ("InIovs", U32),
        ("OutIovs", U32),
    ],
};

pub const POLL_IN: Layout = Layout {
    name: "PollIn",
    fields: &[("Fh", U64), ("Kh", U64), ("Flags", U32), ("Events", U32)],
};

pub const POLL_OUT: Layout = Layout {
    name: "PollOut",
    fields: &[("Revents", U32), ("Padding", U32)],
};

pub const NOTIFY_RETRIEVE_IN: Layout = Layout {
    name: "NotifyRetrieveIn",
    fields: &[
        ("Dummy1", U64),
        ("Offset", U64),
        ("Size", U32),
        ("Dummy2", U32),
        ("Dummy3", U64),
        ("Dummy4", U64),
    ],
};

pub const FALLOCATE_IN: Layout = Layout {
    name: "FallocateIn",
    fields: &[
        ("Fh", U64),
        ("Offset", U64),
        ("Length", U64),
        ("Mode", U32),
        ("Padding", U32),
    ],
};

pub const DIRENT: Layout = Layout {
    name: "Dirent",
    fields: &[("Ino", U64), ("Off", U64), ("Namelen", U32), ("Type", U32)],
};

pub const LSEEK_IN: Layout = Layout {
    name: "LseekIn",
    fields: &[("Fh", U64), ("Offset", U64), ("Whence", U32), ("Padding", U32)],
};

pub const LSEEK_OUT: Layout = Layout {
    name: "LseekOut",
    fields: &[("Offset", U64)],
};

pub const COPY_FILE_RANGE_IN: Layout = Layout {
    name: "CopyFileRangeIn",
    fields: &[
        ("FhIn", U64),
        ("OffIn", U64),
        ("NodeidOut", U64),
        ("FhOut", U64),
        ("OffOut", U64),
        ("Len", U64),
        ("Flags", U64),
    ],
};

// Notifications (written by the filesystem with unique 0).

pub const NOTIFY_POLL_WAKEUP_OUT: Layout = Layout {
    name: "NotifyPollWakeupOut",
    fields: &[("Kh", U64)],
};

pub const NOTIFY_INVAL_INODE_OUT: Layout = Layout {
    name: "NotifyInvalInodeOut",
    fields: &[("Ino", U64), ("Off", I64), ("Len", I64)],
};

pub const NOTIFY_INVAL_ENTRY_OUT: Layout = Layout {
    name: "NotifyInvalEntryOut",
    fields: &[("Parent", U64), ("Namelen", U32), ("Padding", U32)],
};

pub const NOTIFY_STORE_OUT: Layout = Layout {
    name: "NotifyStoreOut",
    fields: &[("Nodeid", U64), ("Offset", U64), ("Size", U32), ("Padding", U32)],
};

pub const NOTIFY_RETRIEVE_OUT: Layout = Layout {
    name: "NotifyRetrieveOut",
    fields: &[
        ("NotifyUnique", U64),
        ("Nodeid", U64),
        ("Offset", U64),
        ("Size", U32),
        ("Padding", U32),
    ],
};

pub const NOTIFY_DELETE_OUT: Layout = Layout {
    name: "NotifyDeleteOut",
    fields: &[
        ("Parent", U64),
        ("Child", U64),
        ("Namelen", U32),
        ("Padding", U32),
    ],
};

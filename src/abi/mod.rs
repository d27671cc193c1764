//! Compiled FUSE protocol tables.
//!
//! Opcode numbers, names and per-direction message shapes for one fixed
//! kernel protocol version. Messages from newer protocol revisions still
//! decode, but opcodes unknown here are shown as `OP#<n>` with a raw body.
//!
//! A message shape is a list of [`Item`]s laid out back to back after the
//! header, following the kernel's own argument lists (e.g. `MKNOD` carries a
//! `fuse_mknod_in` followed by the NUL-terminated entry name).

pub mod layout;

use std::collections::BTreeMap;
use std::fmt;

use layout::*;

/// Protocol major version the tables were compiled for.
pub const FUSE_KERNEL_VERSION: u32 = 7;

/// Protocol minor version the tables were compiled for.
pub const FUSE_KERNEL_MINOR_VERSION: u32 = 31;

pub const LOOKUP: u32 = 1;
pub const FORGET: u32 = 2;
pub const GETATTR: u32 = 3;
pub const SETATTR: u32 = 4;
pub const READLINK: u32 = 5;
pub const SYMLINK: u32 = 6;
pub const MKNOD: u32 = 8;
pub const MKDIR: u32 = 9;
pub const UNLINK: u32 = 10;
pub const RMDIR: u32 = 11;
pub const RENAME: u32 = 12;
pub const LINK: u32 = 13;
pub const OPEN: u32 = 14;
pub const READ: u32 = 15;
pub const WRITE: u32 = 16;
pub const STATFS: u32 = 17;
pub const RELEASE: u32 = 18;
pub const FSYNC: u32 = 20;
pub const SETXATTR: u32 = 21;
pub const GETXATTR: u32 = 22;
pub const LISTXATTR: u32 = 23;
pub const REMOVEXATTR: u32 = 24;
pub const FLUSH: u32 = 25;
pub const INIT: u32 = 26;
pub const OPENDIR: u32 = 27;
pub const READDIR: u32 = 28;
pub const RELEASEDIR: u32 = 29;
pub const FSYNCDIR: u32 = 30;
pub const GETLK: u32 = 31;
pub const SETLK: u32 = 32;
pub const SETLKW: u32 = 33;
pub const ACCESS: u32 = 34;
pub const CREATE: u32 = 35;
pub const INTERRUPT: u32 = 36;
pub const BMAP: u32 = 37;
pub const DESTROY: u32 = 38;
pub const IOCTL: u32 = 39;
pub const POLL: u32 = 40;
pub const NOTIFY_REPLY: u32 = 41;
pub const BATCH_FORGET: u32 = 42;
pub const FALLOCATE: u32 = 43;
pub const READDIRPLUS: u32 = 44;
pub const RENAME2: u32 = 45;
pub const LSEEK: u32 = 46;
pub const COPY_FILE_RANGE: u32 = 47;
pub const CUSE_INIT: u32 = 4096;

/// One element of a message body.
#[derive(Debug, Clone, Copy)]
pub enum Item {
    /// Fixed-size kernel structure.
    Struct(&'static Layout),
    /// NUL-terminated string.
    Name,
    /// Everything that is left.
    Data,
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Struct(layout) => f.write_str(layout.name),
            Item::Name => f.write_str("name"),
            Item::Data => f.write_str("data"),
        }
    }
}

/// Space-separated item list; `-` for an empty body.
pub fn describe(items: &[Item]) -> String {
    if items.is_empty() {
        return "-".to_string();
    }
    items
        .iter()
        .map(Item::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Compiled description of an opcode.
#[derive(Debug)]
pub struct Opcode {
    pub code: u32,
    pub name: &'static str,
    /// Body shape sent by the kernel.
    pub request: &'static [Item],
    /// Body shape of the reply; `None` for operations that are never answered.
    pub reply: Option<&'static [Item]>,
}

const fn op(
    code: u32,
    name: &'static str,
    request: &'static [Item],
    reply: &'static [Item],
) -> Opcode {
    Opcode {
        code,
        name,
        request,
        reply: Some(reply),
    }
}

const NONE: &[Item] = &[];
const NAME: &[Item] = &[Item::Name];
const DATA: &[Item] = &[Item::Data];
const ENTRY: &[Item] = &[Item::Struct(&ENTRY_OUT)];
const ATTR_REPLY: &[Item] = &[Item::Struct(&ATTR_OUT)];
const OPENED: &[Item] = &[Item::Struct(&OPEN_OUT)];

/// Every opcode known to this build, in numeric order.
pub const OPCODES: &[Opcode] = &[
    op(LOOKUP, "LOOKUP", NAME, ENTRY),
    Opcode {
        code: FORGET,
        name: "FORGET",
        request: &[Item::Struct(&FORGET_IN)],
        reply: None,
    },
    op(GETATTR, "GETATTR", &[Item::Struct(&GETATTR_IN)], ATTR_REPLY),
    op(SETATTR, "SETATTR", &[Item::Struct(&SETATTR_IN)], ATTR_REPLY),
    op(READLINK, "READLINK", NONE, DATA),
    op(SYMLINK, "SYMLINK", &[Item::Name, Item::Name], ENTRY),
    op(MKNOD, "MKNOD", &[Item::Struct(&MKNOD_IN), Item::Name], ENTRY),
    op(MKDIR, "MKDIR", &[Item::Struct(&MKDIR_IN), Item::Name], ENTRY),
    op(UNLINK, "UNLINK", NAME, NONE),
    op(RMDIR, "RMDIR", NAME, NONE),
    op(
        RENAME,
        "RENAME",
        &[Item::Struct(&RENAME_IN), Item::Name, Item::Name],
        NONE,
    ),
    op(LINK, "LINK", &[Item::Struct(&LINK_IN), Item::Name], ENTRY),
    op(OPEN, "OPEN", &[Item::Struct(&OPEN_IN)], OPENED),
    op(READ, "READ", &[Item::Struct(&READ_IN)], DATA),
    op(
        WRITE,
        "WRITE",
        &[Item::Struct(&WRITE_IN), Item::Data],
        &[Item::Struct(&WRITE_OUT)],
    ),
    op(STATFS, "STATFS", NONE, &[Item::Struct(&STATFS_OUT)]),
    op(RELEASE, "RELEASE", &[Item::Struct(&RELEASE_IN)], NONE),
    op(FSYNC, "FSYNC", &[Item::Struct(&FSYNC_IN)], NONE),
    op(
        SETXATTR,
        "SETXATTR",
        &[Item::Struct(&SETXATTR_IN), Item::Name, Item::Data],
        NONE,
    ),
    op(
        GETXATTR,
        "GETXATTR",
        &[Item::Struct(&GETXATTR_IN), Item::Name],
        DATA,
    ),
    op(LISTXATTR, "LISTXATTR", &[Item::Struct(&GETXATTR_IN)], DATA),
    op(REMOVEXATTR, "REMOVEXATTR", NAME, NONE),
    op(FLUSH, "FLUSH", &[Item::Struct(&FLUSH_IN)], NONE),
    op(
        INIT,
        "INIT",
        &[Item::Struct(&INIT_IN)],
        &[Item::Struct(&INIT_OUT)],
    ),
    op(OPENDIR, "OPENDIR", &[Item::Struct(&OPEN_IN)], OPENED),
    op(READDIR, "READDIR", &[Item::Struct(&READ_IN)], DATA),
    op(RELEASEDIR, "RELEASEDIR", &[Item::Struct(&RELEASE_IN)], NONE),
    op(FSYNCDIR, "FSYNCDIR", &[Item::Struct(&FSYNC_IN)], NONE),
    op(GETLK, "GETLK", &[Item::Struct(&LK_IN)], &[Item::Struct(&LK_OUT)]),
    op(SETLK, "SETLK", &[Item::Struct(&LK_IN)], NONE),
    op(SETLKW, "SETLKW", &[Item::Struct(&LK_IN)], NONE),
    op(ACCESS, "ACCESS", &[Item::Struct(&ACCESS_IN)], NONE),
    op(
        CREATE,
        "CREATE",
        &[Item::Struct(&CREATE_IN), Item::Name],
        &[Item::Struct(&ENTRY_OUT), Item::Struct(&OPEN_OUT)],
    ),
    op(INTERRUPT, "INTERRUPT", &[Item::Struct(&INTERRUPT_IN)], NONE),
    op(
        BMAP,
        "BMAP",
        &[Item::Struct(&BMAP_IN)],
        &[Item::Struct(&BMAP_OUT)],
    ),
    op(DESTROY, "DESTROY", NONE, NONE),
    op(
        IOCTL,
        "IOCTL",
        &[Item::Struct(&IOCTL_IN), Item::Data],
        &[Item::Struct(&IOCTL_OUT), Item::Data],
    ),
    op(
        POLL,
        "POLL",
        &[Item::Struct(&POLL_IN)],
        &[Item::Struct(&POLL_OUT)],
    ),
    op(
        NOTIFY_REPLY,
        "NOTIFY_REPLY",
        &[Item::Struct(&NOTIFY_RETRIEVE_IN), Item::Data],
        NONE,
    ),
    Opcode {
        code: BATCH_FORGET,
        name: "BATCH_FORGET",
        request: &[Item::Struct(&BATCH_FORGET_IN)],
        reply: None,
    },
    op(FALLOCATE, "FALLOCATE", &[Item::Struct(&FALLOCATE_IN)], NONE),
    op(READDIRPLUS, "READDIRPLUS", &[Item::Struct(&READ_IN)], DATA),
    op(
        RENAME2,
        "RENAME2",
        &[Item::Struct(&RENAME2_IN), Item::Name, Item::Name],
        NONE,
    ),
    op(
        LSEEK,
        "LSEEK",
        &[Item::Struct(&LSEEK_IN)],
        &[Item::Struct(&LSEEK_OUT)],
    ),
    op(
        COPY_FILE_RANGE,
        "COPY_FILE_RANGE",
        &[Item::Struct(&COPY_FILE_RANGE_IN)],
        &[Item::Struct(&WRITE_OUT)],
    ),
    op(CUSE_INIT, "CUSE_INIT", &[Item::Struct(&INIT_IN)], DATA),
];

/// Compiled description of a notification code.
#[derive(Debug)]
pub struct Notification {
    pub code: u32,
    pub name: &'static str,
    pub body: &'static [Item],
}

/// Notifications the filesystem may push to the kernel.
pub const NOTIFICATIONS: &[Notification] = &[
    Notification {
        code: 1,
        name: "NOTIFY_POLL",
        body: &[Item::Struct(&NOTIFY_POLL_WAKEUP_OUT)],
    },
    Notification {
        code: 2,
        name: "NOTIFY_INVAL_INODE",
        body: &[Item::Struct(&NOTIFY_INVAL_INODE_OUT)],
    },
    Notification {
        code: 3,
        name: "NOTIFY_INVAL_ENTRY",
        body: &[Item::Struct(&NOTIFY_INVAL_ENTRY_OUT), Item::Name],
    },
    Notification {
        code: 4,
        name: "NOTIFY_STORE",
        body: &[Item::Struct(&NOTIFY_STORE_OUT), Item::Data],
    },
    Notification {
        code: 5,
        name: "NOTIFY_RETRIEVE",
        body: &[Item::Struct(&NOTIFY_RETRIEVE_OUT)],
    },
    Notification {
        code: 6,
        name: "NOTIFY_DELETE",
        body: &[Item::Struct(&NOTIFY_DELETE_OUT), Item::Name],
    },
];

/// Look up an opcode in the compiled table.
pub fn opcode(code: u32) -> Option<&'static Opcode> {
    OPCODES.iter().find(|op| op.code == code)
}

/// Name of an opcode, if known.
pub fn opcode_name(code: u32) -> Option<&'static str> {
    opcode(code).map(|op| op.name)
}

/// Look up a notification code.
pub fn notification(code: u32) -> Option<&'static Notification> {
    NOTIFICATIONS.iter().find(|n| n.code == code)
}

/// Every structure layout reachable from the opcode and notification
/// tables, nested ones included, ordered by name.
pub fn layouts() -> Vec<&'static Layout> {
    fn visit(layout: &'static Layout, seen: &mut BTreeMap<&'static str, &'static Layout>) {
        if seen.insert(layout.name, layout).is_some() {
            return;
        }
        for (_, ty) in layout.fields {
            if let FieldType::Struct(inner) = ty {
                visit(*inner, seen);
            }
        }
    }

    let mut seen = BTreeMap::new();
    let bodies = OPCODES
        .iter()
        .flat_map(|op| op.request.iter().chain(op.reply.unwrap_or_default()))
        .chain(NOTIFICATIONS.iter().flat_map(|n| n.body));
    for item in bodies {
        if let Item::Struct(layout) = item {
            visit(*layout, &mut seen);
        }
    }
    seen.into_values().collect()
}

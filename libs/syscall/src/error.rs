/// Protocol errors are returned to user tasks as small negative integers.
pub trait ErrorCode: Sized + Copy {
    fn code(self) -> isize;
    fn from_code(code: isize) -> Option<Self>;
}

macro_rules! error_codes {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $code:expr,)* }) => {
        $(#[$meta])*
        #[repr(isize)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code,)*
        }

        impl ErrorCode for $name {
            #[inline]
            fn code(self) -> isize {
                self as isize
            }

            #[inline]
            fn from_code(code: isize) -> Option<Self> {
                [$(Self::$variant),*].into_iter().find(|e| *e as isize == code)
            }
        }

        impl From<$name> for isize {
            #[inline]
            fn from(e: $name) -> isize {
                e as isize
            }
        }
    };
}

error_codes!(CreateError {
    InvalidPriority = -1,
    InsufficientResources = -2,
});

error_codes!(SendError {
    /// The id can never name a task.
    ImpossibleTid = -1,
    /// The task is gone, or is the caller.
    InvalidTid = -2,
    /// The receiver exited before replying.
    Incomplete = -3,
});

error_codes!(ReplyError {
    ImpossibleTid = -1,
    InvalidTid = -2,
    /// The task is not waiting for a reply.
    Unsolicited = -3,
    /// The reply does not fit the sender's reply buffer.
    TooLong = -4,
});

error_codes!(AwaitError {
    UnknownEvent = -1,
    MultipleWaiters = -2,
});

error_codes!(TaskInfoError {
    InvalidTid = -1,
});

/// Split a raw syscall return into a value or a decoded error.
#[inline]
pub fn decode<E: ErrorCode>(ret: isize) -> Result<usize, E> {
    if ret >= 0 {
        return Ok(ret as usize);
    }
    match E::from_code(ret) {
        Some(e) => Err(e),
        None => unreachable!("unexpected syscall error code {}", ret),
    }
}

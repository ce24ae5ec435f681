//! # Standard Error Codes (Errno)
//!
//! Define os códigos de erro recuperáveis retornados pelo kernel.
//! Segue o padrão POSIX/Linux para facilitar compatibilidade futura.
//!
//! Violações de contrato NÃO passam por aqui: elas são fatais por
//! definição e terminam em `crate::core::panic::fatal`.

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    Success = 0,
    EPERM = 1,   // Operation not permitted
    ENOENT = 2,  // No such file or directory
    ESRCH = 3,   // No such process
    EINTR = 4,   // Interrupted system call
    EIO = 5,     // I/O error
    EAGAIN = 11, // Try again
    ENOMEM = 12, // Out of memory
    EFAULT = 14, // Bad address
    EBUSY = 16,  // Device or resource busy
    EEXIST = 17, // File exists
    ENODEV = 19, // No such device
    EINVAL = 22, // Invalid argument
    ENOSYS = 38, // Function not implemented
}

impl Errno {
    pub fn as_usize(self) -> usize {
        self as usize
    }

    pub fn as_isize(self) -> isize {
        -(self as i32) as isize
    }
}

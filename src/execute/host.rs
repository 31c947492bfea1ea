use std::io::Write;

use tracing::debug;

use super::memory::Memory;
use super::stack::Stack;
use crate::error::RuntimeError;

/// `wasi_snapshot_preview1::fd_write`:
/// `(fd: i32, iovs: i32, iovs_len: i32, nwritten_ptr: i32) -> i32`.
///
/// Gathers `iovs_len` iovecs of (buf, len) pairs from linear memory, writes
/// the bytes to stdout (fd 1) or stderr (fd 2), and stores the total count to
/// `nwritten_ptr`. Other fds are ignored but their bytes still count as
/// written. Every memory access is bounds-checked and may trap.
pub(crate) fn fd_write(memory: &mut Memory, stack: &mut Stack) -> Result<(), RuntimeError> {
    let nwritten_ptr = stack.pop_i32()? as u32;
    let iovs_len = stack.pop_i32()?;
    let iovs = stack.pop_i32()? as u32;
    let fd = stack.pop_i32()?;

    let mut gathered = Vec::new();
    let mut total: u32 = 0;
    for i in 0..iovs_len {
        let entry = iovs.wrapping_add((i as u32).wrapping_mul(8));
        let buf = memory.load_u32(entry)?;
        let len = memory.load_u32(entry.wrapping_add(4))?;
        for j in 0..len {
            gathered.push(memory.load_u8(buf.wrapping_add(j))?);
        }
        total = total.wrapping_add(len);
    }

    // Write failures on the host streams are not a guest-visible condition.
    match fd {
        1 => {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(&gathered);
            let _ = stdout.flush();
        }
        2 => {
            let mut stderr = std::io::stderr().lock();
            let _ = stderr.write_all(&gathered);
            let _ = stderr.flush();
        }
        _ => {}
    }
    debug!(fd, bytes = total, "fd_write");

    memory.store_u32(nwritten_ptr, total)?;
    stack.push_i32(0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Limits;
    use crate::error::Trap;

    fn memory_with_iovec(buf: u32, len: u32) -> Memory {
        let mut memory = Memory::new(&Limits { min: 1, max: None }).unwrap();
        memory.initialize(buf, b"hello").unwrap();
        memory.store_u32(64, buf).unwrap();
        memory.store_u32(68, len).unwrap();
        memory
    }

    #[test]
    fn reports_bytes_written_and_succeeds() {
        let mut memory = memory_with_iovec(0, 5);
        let mut stack = Stack::default();
        // fd 3 is ignored, so nothing lands on the test output
        stack.push_i32(3);
        stack.push_i32(64);
        stack.push_i32(1);
        stack.push_i32(80);
        fd_write(&mut memory, &mut stack).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0);
        assert_eq!(memory.load_u32(80).unwrap(), 5);
    }

    #[test]
    fn out_of_bounds_iovec_traps() {
        let mut memory = memory_with_iovec(0, 5);
        let size = memory.size_in_bytes() as u32;
        memory.store_u32(64, size - 2).unwrap(); // buf runs off the end
        let mut stack = Stack::default();
        stack.push_i32(3);
        stack.push_i32(64);
        stack.push_i32(1);
        stack.push_i32(80);
        assert_eq!(
            fd_write(&mut memory, &mut stack),
            Err(RuntimeError::Trap(Trap::MemoryOutOfBounds))
        );
    }
}

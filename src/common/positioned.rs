// Positioned reads that do not move a shared file cursor
//
// Several workers may read through the same `File` at once, so every read
// names its own offset instead of seeking.

use std::fs::File;
use std::io;

#[cfg(unix)]
pub fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    loop {
        match file.read_at(buf, offset) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

#[cfg(windows)]
pub fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    match file.seek_read(buf, offset) {
        // Reading past the end of a file reports EOF as an error on Windows
        Err(e) if e.raw_os_error() == Some(38) => Ok(0),
        other => other,
    }
}

/// Fill as much of `buf` as the file allows, stopping early only at EOF
pub fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = read_at(file, &mut buf[filled..], offset + filled as u64)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_at_offsets() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(read_full_at(&file, &mut buf, 3).unwrap(), 4);
        assert_eq!(&buf, b"3456");

        // Short at the end, zero past it
        assert_eq!(read_full_at(&file, &mut buf, 8).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(read_full_at(&file, &mut buf, 50).unwrap(), 0);
    }
}

use core::fmt;
use core::str;

/// Maximum length of a task's diagnostic name, in bytes.
pub const MAX_TASK_NAME_LEN: usize = 16;

/// Fixed-capacity diagnostic task name.
///
/// Longer names are truncated at a character boundary so the stored bytes
/// are always valid UTF-8.
#[derive(Clone, Copy)]
pub struct TaskName {
  buf: [u8; MAX_TASK_NAME_LEN],
  len: u8,
}

impl TaskName {
  pub(crate) fn new(name: &str) -> Self {
    let mut buf = [0; MAX_TASK_NAME_LEN];
    let mut len = 0;

    for c in name.chars() {
      if len + c.len_utf8() > MAX_TASK_NAME_LEN {
        break
      }

      c.encode_utf8(&mut buf[len..]);
      len += c.len_utf8();
    }

    Self { buf, len: len as u8 }
  }

  /// View the name as a string slice.
  pub fn as_str(&self) -> &str {
    str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
  }
}

impl fmt::Debug for TaskName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(self.as_str(), f)
  }
}

impl fmt::Display for TaskName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

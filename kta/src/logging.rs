use core::fmt;

use kta_msg::Message;

pub(crate) fn msg_summary(msg: &Message) -> String {
  let opts = msg.opts
                .iter()
                .map(|(n, vs)| format!("{}x{}", n.0, vs.len()))
                .collect::<Vec<_>>()
                .join(",");

  format!("{:?} {} id={} token={:02x?} opts=[{}] with {} byte payload",
          msg.ty,
          msg.code,
          msg.id.0,
          msg.token.0.as_slice(),
          opts,
          msg.payload.0.len())
}

/// Lowercase hex rendering of a datagram, 16 bytes per line
pub(crate) struct HexDump<'a>(pub(crate) &'a [u8]);

impl<'a> fmt::Display for HexDump<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (ix, line) in self.0.chunks(16).enumerate() {
      if ix > 0 {
        writeln!(f)?;
      }

      write!(f, "{:04x}:", ix * 16)?;
      for b in line {
        write!(f, " {:02x}", b)?;
      }
    }

    Ok(())
  }
}

pub(crate) fn trace_dgram(dir: &str, bytes: &[u8]) {
  if log::log_enabled!(log::Level::Trace) {
    log::trace!("{} {} bytes\n{}", dir, bytes.len(), HexDump(bytes));
  }
}

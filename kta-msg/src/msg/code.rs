/// # Message Code
/// 8-bit unsigned integer, split into a 3-bit class (most
/// significant bits) and a 5-bit detail (least significant bits),
/// documented as "c.dd" where "c" is a digit from 0 to 7 for the
/// 3-bit subfield and "dd" are two digits from 00 to 31 for the 5-bit
/// subfield.
///
/// The class can indicate a request (0), a success response (2),
/// a client error response (4), or a server error response (5).
///
/// ```
/// use kta_msg::Code;
///
/// assert_eq!(Code::new(2, 5).to_string(), "2.05");
/// assert_eq!(u8::from(Code::POST), 0b000_00010);
/// assert_eq!(Code::from(0b010_11111), Code::new(2, 31));
/// ```
///
/// See [RFC7252 - Message Details](https://datatracker.ietf.org/doc/html/rfc7252#section-3) for context
#[derive(Copy, Clone, Hash, Eq, Ord, PartialEq, PartialOrd, Debug)]
pub struct Code {
  /// The "class" of message codes identify it as a request or response, and provides the class of response status:
  ///
  /// |class|meaning|
  /// |---|---|
  /// |`0`|Message is a request|
  /// |`2`|Message is a success response|
  /// |`4`|Message is a client error response|
  /// |`5`|Message is a server error response|
  pub class: u8,

  /// 2-digit integer (range `[0, 32)`) that provides granular information about the response status.
  pub detail: u8,
}

/// Whether a code is for a request, response, or empty message
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CodeKind {
  /// A request code (0.xx, excluding 0.00)
  Request,
  /// A response code (2.xx, 4.xx, 5.xx)
  Response,
  /// EMPTY (0.00)
  Empty,
}

impl Code {
  /// 0.00 Empty
  pub const EMPTY: Self = Self::new(0, 0);
  /// 0.01 GET
  pub const GET: Self = Self::new(0, 1);
  /// 0.02 POST
  pub const POST: Self = Self::new(0, 2);
  /// 2.05 Content
  pub const CONTENT: Self = Self::new(2, 5);
  /// 2.04 Changed
  pub const CHANGED: Self = Self::new(2, 4);
  /// 2.31 Continue; a block of a block-wise request body was accepted
  pub const CONTINUE: Self = Self::new(2, 31);
  /// 4.08 Request Entity Incomplete
  pub const REQUEST_ENTITY_INCOMPLETE: Self = Self::new(4, 8);

  /// Create a new Code
  pub const fn new(class: u8, detail: u8) -> Self {
    Self { class, detail }
  }

  /// Get whether this code is for a request, response, or empty message
  ///
  /// ```
  /// use kta_msg::{Code, CodeKind};
  ///
  /// assert_eq!(Code::EMPTY.kind(), CodeKind::Empty);
  /// assert_eq!(Code::POST.kind(), CodeKind::Request);
  /// assert_eq!(Code::CONTENT.kind(), CodeKind::Response);
  /// ```
  pub fn kind(&self) -> CodeKind {
    match (self.class, self.detail) {
      | (0, 0) => CodeKind::Empty,
      | (0, _) => CodeKind::Request,
      | _ => CodeKind::Response,
    }
  }
}

impl core::fmt::Display for Code {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}.{:02}", self.class, self.detail)
  }
}

impl From<u8> for Code {
  fn from(b: u8) -> Self {
    let class = b >> 5;
    let detail = b & 0b0011111;

    Code { class, detail }
  }
}

impl From<Code> for u8 {
  fn from(code: Code) -> u8 {
    let class = code.class << 5;
    let detail = code.detail & 0b0011111;

    class | detail
  }
}

/// Content-Format values
pub mod content_format;
pub use content_format::*;

/// Block1 & Block2 values
pub mod block;
pub use block::*;

macro_rules! opt {
  (rfc($rfc:literal, $section:literal) $name:ident = $n:literal) => {
    #[doc = concat!("See [RFC",
                    $rfc,
                    " section ",
                    $section,
                    "](https://datatracker.ietf.org/doc/html/rfc",
                    $rfc,
                    "#section-",
                    $section,
                    ")")]
    pub const $name: crate::OptNumber = crate::OptNumber($n);
  };
}

/// Non-repeatable options
pub mod no_repeat {
  opt!(rfc("7252", "5.10.1") HOST = 3);
  opt!(rfc("7252", "5.10.8.2") IF_NONE_MATCH = 5);
  opt!(rfc("7252", "5.10.1") PORT = 7);
  opt!(rfc("7252", "5.10.1") PATH = 11);
  opt!(rfc("7252", "5.10.3") CONTENT_FORMAT = 12);
  opt!(rfc("7252", "5.10.5") MAX_AGE = 14);
  opt!(rfc("7252", "5.10.4") ACCEPT = 17);
  opt!(rfc("7959", "2.2") BLOCK2 = 23);
  opt!(rfc("7959", "2.2") BLOCK1 = 27);
  opt!(rfc("7959", "4") SIZE2 = 28);
  opt!(rfc("7252", "5.10.2") PROXY_URI = 35);
  opt!(rfc("7252", "5.10.2") PROXY_SCHEME = 39);
  opt!(rfc("7252", "5.10.9") SIZE1 = 60);
}

/// Repeatable options
pub mod repeat {
  opt!(rfc("7252", "5.10.8.1") IF_MATCH = 1);
  opt!(rfc("7252", "5.10.6") ETAG = 4);
  opt!(rfc("7252", "5.10.7") LOCATION_PATH = 8);
  opt!(rfc("7252", "5.10.1") QUERY = 15);
  opt!(rfc("7252", "5.10.7") LOCATION_QUERY = 20);
}

//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` so the common case never touches
//! the heap. Ordering is lexicographic by arc, with a proper prefix sorting
//! before any of its extensions; the record store relies on this for
//! GETNEXT.

use std::fmt;

use smallvec::SmallVec;

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};

/// Maximum number of arcs (RFC 2578 Section 3.5).
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an OID from arc values.
    ///
    /// ```
    /// use snmp_responder::oid::Oid;
    ///
    /// let oid = Oid::new([1, 3, 6, 1, 2, 1]);
    /// assert_eq!(oid.to_string(), "1.3.6.1.2.1");
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted notation. A single leading dot is accepted, as written by
    /// net-snmp tools (`.1.3.6.1.2.1.1.1.0`).
    ///
    /// ```
    /// use snmp_responder::oid::Oid;
    ///
    /// let a = Oid::parse("1.3.6.1.2.1.1.5.0").unwrap();
    /// let b = Oid::parse(".1.3.6.1.2.1.1.5.0").unwrap();
    /// assert_eq!(a, b);
    /// assert!(Oid::parse("1.3..6").is_err());
    /// assert!(Oid::parse("1.3.six").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.trim().strip_prefix('.').unwrap_or(s.trim());
        if body.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();
        for part in body.split('.') {
            let arc: u32 = part
                .parse()
                .map_err(|_| Error::invalid_oid(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }

        let oid = Self { arcs };
        oid.validate(s)?;
        Ok(oid)
    }

    fn validate(&self, input: &str) -> Result<()> {
        if self.arcs.len() > MAX_OID_LEN {
            return Err(Error::invalid_oid(
                OidErrorKind::TooManyArcs {
                    count: self.arcs.len(),
                    max: MAX_OID_LEN,
                },
                input,
            ));
        }
        if let Some(&first) = self.arcs.first() {
            if first > 2 {
                return Err(Error::invalid_oid(OidErrorKind::InvalidFirstArc(first), input));
            }
            if let Some(&second) = self.arcs.get(1)
                && first < 2
                && second >= 40
            {
                return Err(Error::invalid_oid(
                    OidErrorKind::InvalidSecondArc { first, second },
                    input,
                ));
            }
        }
        Ok(())
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// True if `self` begins with every arc of `prefix`.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// All arcs but the last, or `None` for the empty OID.
    pub fn parent(&self) -> Option<Oid> {
        let (_, head) = self.arcs.split_last()?;
        Some(Oid::from_slice(head))
    }

    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// BER content octets (X.690 Section 8.19).
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();
        match self.arcs.as_slice() {
            [] => {}
            [first] => encode_subidentifier(&mut bytes, first.saturating_mul(40)),
            [first, second, rest @ ..] => {
                encode_subidentifier(&mut bytes, first.saturating_mul(40).saturating_add(*second));
                for &arc in rest {
                    encode_subidentifier(&mut bytes, arc);
                }
            }
        }
        bytes
    }

    /// Encoded TLV size, used to budget GETBULK responses.
    pub fn ber_encoded_len(&self) -> usize {
        crate::ber::tlv_len(self.to_ber_smallvec().len())
    }

    pub(crate) fn from_ber(data: &[u8]) -> std::result::Result<Self, DecodeErrorKind> {
        if data.is_empty() {
            return Ok(Self::empty());
        }

        let mut arcs = SmallVec::new();
        let (first, mut i) = decode_subidentifier(data)?;
        match first {
            0..40 => arcs.extend([0, first]),
            40..80 => arcs.extend([1, first - 40]),
            _ => arcs.extend([2, first - 80]),
        }

        while i < data.len() {
            let (arc, consumed) = decode_subidentifier(&data[i..])?;
            arcs.push(arc);
            i += consumed;
            if arcs.len() > MAX_OID_LEN {
                return Err(DecodeErrorKind::OidTooLong {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                });
            }
        }
        Ok(Self { arcs })
    }
}

fn encode_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    let groups = (32 - value.leading_zeros()).div_ceil(7).max(1);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

fn decode_subidentifier(data: &[u8]) -> std::result::Result<(u32, usize), DecodeErrorKind> {
    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(DecodeErrorKind::IntegerOverflow);
        }
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(DecodeErrorKind::TruncatedData)
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.arcs.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
            for arc in arcs {
                write!(f, ".{}", arc)?;
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::from_slice(&arcs)
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.arcs.as_slice().cmp(other.arcs.as_slice())
    }
}

/// Build an OID from literal arcs.
///
/// ```
/// use snmp_responder::oid;
///
/// let sys_location = oid!(1, 3, 6, 1, 2, 1, 1, 6, 0);
/// assert_eq!(sys_location.to_string(), "1.3.6.1.2.1.1.6.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

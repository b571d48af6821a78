use std::fmt::{Debug, Formatter};
use std::ops::Not;

crate::create_ref_type!(BVar);

impl BVar {
    /// Literal that is true when this variable is true.
    pub const fn true_lit(self) -> Lit {
        Lit::new(self, true)
    }

    /// Literal that is true when this variable is false.
    pub const fn false_lit(self) -> Lit {
        Lit::new(self, false)
    }
}

/// A boolean literal: a variable or its negation.
///
/// The literal is encoded on 32 bits as `(var << 1) | negated`, so that the two literals
/// of a variable are adjacent and a literal can be used as a dense index.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    pub const fn new(var: BVar, value: bool) -> Lit {
        Lit((var.to_u32() << 1) | (!value as u32))
    }

    pub const fn variable(self) -> BVar {
        BVar::from_u32(self.0 >> 1)
    }

    /// True if the literal holds when its variable is true.
    pub const fn is_positive(self) -> bool {
        self.0 & 1 == 0
    }

    pub const fn negated(self) -> Lit {
        Lit(self.0 ^ 1)
    }

    /// Value that the variable must take for this literal to hold.
    pub const fn polarity(self) -> bool {
        self.is_positive()
    }
}

impl Not for Lit {
    type Output = Lit;

    fn not(self) -> Self::Output {
        self.negated()
    }
}

impl From<Lit> for usize {
    fn from(l: Lit) -> Self {
        l.0 as usize
    }
}

impl From<usize> for Lit {
    fn from(u: usize) -> Self {
        Lit(u as u32)
    }
}

impl From<BVar> for Lit {
    fn from(v: BVar) -> Self {
        v.true_lit()
    }
}

impl Debug for Lit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.is_positive() {
            write!(f, "b{}", self.variable().to_u32())
        } else {
            write!(f, "!b{}", self.variable().to_u32())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding() {
        let v = BVar::from(3usize);
        let l = v.true_lit();
        assert!(l.is_positive());
        assert_eq!(l.variable(), v);
        assert_eq!(!l, v.false_lit());
        assert_eq!(!!l, l);
        assert_eq!((!l).variable(), v);
        assert!(!(!l).polarity());
        assert_eq!(usize::from(l), 6);
        assert_eq!(usize::from(!l), 7);
        assert_eq!(Lit::from(7usize), !l);
        assert_eq!(format!("{:?} {:?}", l, !l), "b3 !b3");
    }
}

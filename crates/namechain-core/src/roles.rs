//! Role bitmaps for enhanced access control
//!
//! Each base role occupies its own nybble in the low 128 bits. The admin
//! counterpart of a role sits exactly 128 bits higher:
//!
//! | Bits | Content |
//! |------|---------|
//! | 0..128 | base roles |
//! | 128..256 | admin roles (`role << 128`) |
//!
//! Holding the admin bit of a role is what allows granting or revoking that
//! role to someone else.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Resource id that scopes a role grant to every token of a registry
pub const ROOT_RESOURCE: U256 = U256::ZERO;

/// Shift between a base role and its admin role
pub const ADMIN_SHIFT: usize = 128;

const fn role(nybble: usize) -> RoleBitmap {
    let mut limbs = [0u64; 4];
    limbs[(nybble * 4) / 64] = 1u64 << ((nybble * 4) % 64);
    RoleBitmap(U256::from_limbs(limbs))
}

const fn admin_of(base: RoleBitmap) -> RoleBitmap {
    let limbs = base.0.as_limbs();
    RoleBitmap(U256::from_limbs([0, 0, limbs[0], limbs[1]]))
}

/// Named role constants
pub mod roles {
    use super::{admin_of, role, RoleBitmap};

    pub const REGISTRAR: RoleBitmap = role(0);
    pub const RENEW: RoleBitmap = role(1);
    pub const SET_SUBREGISTRY: RoleBitmap = role(2);
    pub const SET_RESOLVER: RoleBitmap = role(3);
    pub const SET_TOKEN_OBSERVER: RoleBitmap = role(4);
    pub const UNREGISTER: RoleBitmap = role(5);
    pub const MIGRATION_CONTROLLER: RoleBitmap = role(6);
    pub const BRIDGE: RoleBitmap = role(7);

    pub const ADMIN_REGISTRAR: RoleBitmap = admin_of(REGISTRAR);
    pub const ADMIN_RENEW: RoleBitmap = admin_of(RENEW);
    pub const ADMIN_SET_SUBREGISTRY: RoleBitmap = admin_of(SET_SUBREGISTRY);
    pub const ADMIN_SET_RESOLVER: RoleBitmap = admin_of(SET_RESOLVER);
    pub const ADMIN_SET_TOKEN_OBSERVER: RoleBitmap = admin_of(SET_TOKEN_OBSERVER);
    pub const ADMIN_UNREGISTER: RoleBitmap = admin_of(UNREGISTER);
    pub const ADMIN_MIGRATION_CONTROLLER: RoleBitmap = admin_of(MIGRATION_CONTROLLER);
    pub const ADMIN_BRIDGE: RoleBitmap = admin_of(BRIDGE);

    /// Every base role
    pub const ALL: RoleBitmap = REGISTRAR
        .union(RENEW)
        .union(SET_SUBREGISTRY)
        .union(SET_RESOLVER)
        .union(SET_TOKEN_OBSERVER)
        .union(UNREGISTER)
        .union(MIGRATION_CONTROLLER)
        .union(BRIDGE);

    /// Every admin role
    pub const ADMIN_ALL: RoleBitmap = admin_of(ALL);

    /// Roles a registrant normally receives on their own token
    pub const OWNER_DEFAULT: RoleBitmap = RENEW
        .union(SET_SUBREGISTRY)
        .union(SET_RESOLVER)
        .union(SET_TOKEN_OBSERVER)
        .union(ADMIN_SET_SUBREGISTRY)
        .union(ADMIN_SET_RESOLVER);
}

/// A 256-bit capability set
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleBitmap(pub U256);

impl RoleBitmap {
    pub const EMPTY: Self = Self(U256::ZERO);
    pub const MAX: Self = Self(U256::MAX);

    /// Bitwise union, usable in const context
    pub const fn union(self, other: Self) -> Self {
        let a = self.0.as_limbs();
        let b = other.0.as_limbs();
        Self(U256::from_limbs([a[0] | b[0], a[1] | b[1], a[2] | b[2], a[3] | b[3]]))
    }

    /// True if every bit of `required` is set
    pub fn has_all(&self, required: RoleBitmap) -> bool {
        self.0 & required.0 == required.0
    }

    /// True if at least one bit of `any` is set
    pub fn has_any(&self, any: RoleBitmap) -> bool {
        !(self.0 & any.0).is_zero()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_zero()
    }

    /// Remove `other`'s bits
    pub fn without(self, other: RoleBitmap) -> Self {
        Self(self.0 & !other.0)
    }

    /// Admin bits governing the base roles in `self`
    pub fn admin(self) -> Self {
        Self((self.0 << ADMIN_SHIFT) & roles::ADMIN_ALL.0)
    }

    /// Base roles only (admin half cleared)
    pub fn base(self) -> Self {
        Self(self.0 & (U256::MAX >> ADMIN_SHIFT))
    }
}

impl BitOr for RoleBitmap {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for RoleBitmap {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for RoleBitmap {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for RoleBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleBitmap({:#x})", self.0)
    }
}

impl fmt::Display for RoleBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<U256> for RoleBitmap {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

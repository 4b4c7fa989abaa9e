//! Ring tokens and decorated keys.

use crate::key::{Key, KeyKind, KeyView};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

/// Position of a partition on the token ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub i64);

impl Token {
    /// Smallest token.
    pub const MIN: Token = Token(i64::MIN);
    /// Largest token.
    pub const MAX: Token = Token(i64::MAX);

    /// Creates a token.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw token value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "token:{}", self.0)
    }
}

/// Which end of a token's keys a bare token stands for when compared
/// against partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenBound {
    /// Sorts before every partition with the token.
    Start,
    /// Sorts after every partition with the token.
    End,
}

impl TokenBound {
    fn key_kind(self) -> KeyKind {
        match self {
            TokenBound::Start => KeyKind::BeforeAllKeys,
            TokenBound::End => KeyKind::AfterAllKeys,
        }
    }
}

/// Compares a partition at `token` with key kind `kind` against a bound.
fn tri_compare_ring(token: Token, kind: KeyKind, other: Token, bound: TokenBound) -> Ordering {
    token
        .cmp(&other)
        .then_with(|| kind.cmp(&bound.key_kind()))
}

/// A partition's identity for placement and ordering: its token plus key.
///
/// Decorated keys order by token first, then by key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecoratedKey {
    token: Token,
    key: Key,
}

impl DecoratedKey {
    /// Pairs a token with a key.
    pub fn new(token: Token, key: Key) -> Self {
        Self { token, key }
    }

    /// The token.
    pub fn token(&self) -> Token {
        self.token
    }

    /// The key.
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Borrows this decorated key.
    pub fn as_view(&self) -> DecoratedKeyView<'_> {
        DecoratedKeyView::new(self.token, self.key.as_view())
    }

    /// Compares this partition's ring position against `token`.
    ///
    /// Partitions with a different token order by token. At the same token
    /// a regular key sorts after [`TokenBound::Start`] and before
    /// [`TokenBound::End`]; a sentinel equals the bound on its own side.
    pub fn tri_compare_token(&self, token: Token, bound: TokenBound) -> Ordering {
        tri_compare_ring(self.token, self.key.kind(), token, bound)
    }
}

impl PartialOrd for DecoratedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecoratedKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token
            .cmp(&other.token)
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl fmt::Display for DecoratedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {:?}}}", self.token, self.key)
    }
}

/// A borrowed decorated key, valid while the key bytes are alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DecoratedKeyView<'a> {
    token: Token,
    key: KeyView<'a>,
}

impl<'a> DecoratedKeyView<'a> {
    /// Pairs a token with a borrowed key.
    pub const fn new(token: Token, key: KeyView<'a>) -> Self {
        Self { token, key }
    }

    /// The token.
    pub const fn token(&self) -> Token {
        self.token
    }

    /// The borrowed key.
    pub const fn key(&self) -> KeyView<'a> {
        self.key
    }

    /// Copies into an owned decorated key.
    pub fn to_decorated_key(&self) -> DecoratedKey {
        DecoratedKey::new(self.token, self.key.to_key())
    }

    /// See [`DecoratedKey::tri_compare_token`].
    pub fn tri_compare_token(&self, token: Token, bound: TokenBound) -> Ordering {
        tri_compare_ring(self.token, self.key.kind(), token, bound)
    }
}

/// Maps partition keys to tokens.
pub trait Partitioner {
    /// Computes the token of an encoded key. Must be a pure function of the
    /// key bytes.
    fn token_of(&self, key: KeyView<'_>) -> Token;

    /// Decorates a key with its token. Sentinels map to the ring bounds.
    fn decorate(&self, key: Key) -> DecoratedKey {
        let token = match key.kind() {
            KeyKind::BeforeAllKeys => Token::MIN,
            KeyKind::AfterAllKeys => Token::MAX,
            KeyKind::Regular => self.token_of(key.as_view()),
        };
        DecoratedKey::new(token, key)
    }
}

/// Derives tokens from the first eight bytes of the key's SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Partitioner;

impl Partitioner for Sha256Partitioner {
    fn token_of(&self, key: KeyView<'_>) -> Token {
        let digest = Sha256::digest(key.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Token(i64::from_be_bytes(head))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorated_keys_order_by_token_then_key() {
        let a = DecoratedKey::new(Token(5), Key::from_bytes(vec![9]));
        let b = DecoratedKey::new(Token(6), Key::from_bytes(vec![1]));
        let c = DecoratedKey::new(Token(6), Key::from_bytes(vec![2]));
        assert!(a < b);
        assert!(b < c);
        assert!(a.as_view() < b.as_view());
        assert!(b.as_view() < c.as_view());
    }

    #[test]
    fn view_round_trip() {
        let dk = DecoratedKey::new(Token(-3), Key::from_bytes(vec![4, 2]));
        let view = dk.as_view();
        assert_eq!(view.token(), Token(-3));
        assert_eq!(view.key().as_bytes(), &[4, 2]);
        assert_eq!(view.to_decorated_key(), dk);
    }

    #[test]
    fn sha256_partitioner_is_deterministic() {
        let p = Sha256Partitioner;
        let key = Key::from_bytes(b"user:42".to_vec());
        let t1 = p.token_of(key.as_view());
        let t2 = p.token_of(key.as_view());
        assert_eq!(t1, t2);

        let other = Key::from_bytes(b"user:43".to_vec());
        assert_ne!(t1, p.token_of(other.as_view()));
    }

    #[test]
    fn sentinels_decorate_to_ring_bounds() {
        let p = Sha256Partitioner;
        assert_eq!(p.decorate(Key::minimum()).token(), Token::MIN);
        assert_eq!(p.decorate(Key::maximum()).token(), Token::MAX);
    }

    #[test]
    fn sentinel_views_keep_ring_order() {
        let p = Sha256Partitioner;
        let min = p.decorate(Key::minimum());
        let max = p.decorate(Key::maximum());
        let low = DecoratedKey::new(Token::MIN, Key::from_bytes(vec![0xff]));
        let high = DecoratedKey::new(Token::MAX, Key::from_bytes(vec![0xff]));

        assert!(max > high);
        assert!(max.as_view() > high.as_view());
        assert!(min < low);
        assert!(min.as_view() < low.as_view());
        assert_eq!(max.as_view().to_decorated_key(), max);
    }

    #[test]
    fn compare_against_token_bounds() {
        let dk = DecoratedKey::new(Token(10), Key::from_bytes(vec![1]));
        assert_eq!(dk.tri_compare_token(Token(9), TokenBound::End), Ordering::Greater);
        assert_eq!(dk.tri_compare_token(Token(11), TokenBound::Start), Ordering::Less);
        assert_eq!(dk.tri_compare_token(Token(10), TokenBound::Start), Ordering::Greater);
        assert_eq!(dk.tri_compare_token(Token(10), TokenBound::End), Ordering::Less);
        assert_eq!(
            dk.as_view().tri_compare_token(Token(10), TokenBound::End),
            Ordering::Less
        );
    }

    #[test]
    fn sentinels_meet_their_own_bound() {
        let p = Sha256Partitioner;
        let min = p.decorate(Key::minimum());
        let max = p.decorate(Key::maximum());

        assert_eq!(min.tri_compare_token(Token::MIN, TokenBound::Start), Ordering::Equal);
        assert_eq!(min.tri_compare_token(Token::MIN, TokenBound::End), Ordering::Less);
        assert_eq!(max.tri_compare_token(Token::MAX, TokenBound::End), Ordering::Equal);
        assert_eq!(max.tri_compare_token(Token::MAX, TokenBound::Start), Ordering::Greater);
        assert_eq!(
            max.as_view().tri_compare_token(Token::MAX, TokenBound::End),
            Ordering::Equal
        );
    }
}

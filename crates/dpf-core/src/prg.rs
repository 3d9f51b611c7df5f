//! PRG for DPF seed expansion
//!
//! Uses fixed-key AES-128 in Matyas-Meyer-Oseas mode: `G(s) = AES_k(s) XOR s`.
//! Three independent keys derive the left child, the right child and the
//! output value of a tree node from its 128-bit seed.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;

/// 128-bit seed / PRG block
pub type Block = u128;

const LEFT_KEY: [u8; 16] = [
    0x5f, 0x2e, 0x81, 0x0c, 0x36, 0xd4, 0x19, 0xa7, 0x63, 0x0b, 0xe8, 0x42, 0x9d, 0x71, 0xc5, 0x1a,
];
const RIGHT_KEY: [u8; 16] = [
    0xb3, 0x47, 0x0e, 0xd9, 0x2c, 0x85, 0x6a, 0xf1, 0x14, 0x9e, 0x57, 0x3b, 0xc0, 0x28, 0x7d, 0xe6,
];
const VALUE_KEY: [u8; 16] = [
    0x0d, 0xa1, 0x74, 0x3f, 0xe2, 0x58, 0xcb, 0x96, 0x21, 0x6e, 0xb5, 0x0a, 0x4c, 0xf7, 0x83, 0x39,
];

/// Single fixed-key PRG instance
pub struct Prg {
    cipher: Aes128,
}

impl Prg {
    pub fn new(key: &[u8; 16]) -> Self {
        let cipher = Aes128::new(&(*key).into());
        Self { cipher }
    }

    /// Evaluate `AES_k(seed) XOR seed`
    pub fn eval(&self, seed: Block) -> Block {
        let mut block = aes::Block::from(seed.to_le_bytes());
        self.cipher.encrypt_block(&mut block);

        let mut out = [0u8; 16];
        out.copy_from_slice(&block);
        u128::from_le_bytes(out) ^ seed
    }
}

/// One expanded child: a fresh seed and its control bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Child {
    pub seed: Block,
    pub control: bool,
}

/// Expands tree nodes into children and output values
pub struct SeedExpander {
    left: Prg,
    right: Prg,
    value: Prg,
}

impl SeedExpander {
    pub fn new() -> Self {
        Self {
            left: Prg::new(&LEFT_KEY),
            right: Prg::new(&RIGHT_KEY),
            value: Prg::new(&VALUE_KEY),
        }
    }

    /// Expand a seed into its (left, right) children.
    ///
    /// The least significant bit of each PRG output becomes the control bit
    /// and is cleared from the child seed.
    pub fn expand(&self, seed: Block) -> [Child; 2] {
        [
            split_control(self.left.eval(seed)),
            split_control(self.right.eval(seed)),
        ]
    }

    /// Pseudorandom 64-bit value of a node, used for output conversion
    pub fn convert(&self, seed: Block) -> u64 {
        self.value.eval(seed) as u64
    }
}

impl Default for SeedExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn split_control(block: Block) -> Child {
    Child {
        seed: block & !1,
        control: block & 1 == 1,
    }
}

use solana_program::pubkey::Pubkey;

/// Public half of a signing identity. Signing itself stays with the
/// collaborator that submits to the network.
pub trait Identity {
    fn public_key(&self) -> Pubkey;
}

impl Identity for Pubkey {
    fn public_key(&self) -> Pubkey {
        *self
    }
}

impl<T: Identity + ?Sized> Identity for &T {
    fn public_key(&self) -> Pubkey {
        (**self).public_key()
    }
}

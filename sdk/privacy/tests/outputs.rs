use ark_ff::Zero;
use rand::SeedableRng;
use rand::rngs::StdRng;
use shieldpool_privacy::{
    CIPHERTEXT_LENGTH, CircomPoseidon, FieldElement, PrivacyError, RootKeys, SIGNATURE_LENGTH,
    Scalar, SecretCiphertext, TriadMerkleTree, create_output, decrypt_secret, encrypt_secret,
    is_child_key_valid, nullifier, random_scalar, recover_output, verify_merkle_path,
};

fn wallet(fill: u8) -> RootKeys {
    let mut signature = vec![fill; SIGNATURE_LENGTH];
    signature[0] = 0x1b;
    signature[64] = 0x1c;
    RootKeys::from_signature(&signature, &CircomPoseidon::new()).unwrap()
}

#[test]
fn output_lifecycle() {
    let mut rng = StdRng::seed_from_u64(7);
    let hasher = CircomPoseidon::new();
    let alice = wallet(0xa1);
    let bob = wallet(0xb0);

    // Sender side: two outputs for bob, one decoy for alice
    let out_bob = create_output(&bob.address(), &hasher, &mut rng).unwrap();
    let out_alice = create_output(&alice.address(), &hasher, &mut rng).unwrap();
    let out_bob2 = create_output(&bob.address(), &hasher, &mut rng).unwrap();

    let mut tree = TriadMerkleTree::new(4, FieldElement::zero(), CircomPoseidon::new()).unwrap();
    let first = tree
        .insert_batch([out_bob.commitment, out_alice.commitment, out_bob2.commitment])
        .unwrap();
    assert_eq!(first, 0);

    // Recipient side
    let recovered = recover_output(&out_bob2.ciphertext, &bob, &hasher).unwrap();
    assert_eq!(recovered.commitment, out_bob2.commitment);
    assert!(is_child_key_valid(
        &out_bob2.stealth_public_key,
        &bob.spending,
        &recovered.blinding
    ));

    let leaf_index = tree.index_of(&recovered.commitment).unwrap();
    assert_eq!(leaf_index, 2);

    let proof = tree.gen_merkle_path(leaf_index).unwrap();
    assert_eq!(proof.leaf, recovered.commitment);
    assert!(verify_merkle_path(&proof, &hasher));

    let n = recovered.nullifier(leaf_index, &hasher).unwrap();
    assert_eq!(
        n,
        nullifier(recovered.stealth_keypair.private_key(), leaf_index, &hasher).unwrap()
    );
}

#[test]
fn wrong_wallet_cannot_recover() {
    let mut rng = StdRng::seed_from_u64(11);
    let hasher = CircomPoseidon::new();
    let bob = wallet(0x42);
    let eve = wallet(0x43);

    let output = create_output(&bob.address(), &hasher, &mut rng).unwrap();
    match recover_output(&output.ciphertext, &eve, &hasher) {
        Ok(recovered) => assert_ne!(recovered.commitment, output.commitment),
        Err(e) => assert!(matches!(
            e,
            PrivacyError::DecryptionIntegrity | PrivacyError::FieldRange(_)
        )),
    }
}

#[test]
fn ciphertext_is_always_64_bytes() {
    let mut rng = StdRng::seed_from_u64(3);
    let bob = wallet(0x11);

    for secret in [Scalar::zero(), Scalar::from(1u64), random_scalar(&mut rng)] {
        let ct = encrypt_secret(&secret, bob.reading.public_key(), &mut rng).unwrap();
        let bytes = ct.to_bytes();
        assert_eq!(bytes.len(), CIPHERTEXT_LENGTH);

        let parsed = SecretCiphertext::from_bytes(&bytes).unwrap();
        assert_eq!(
            decrypt_secret(&parsed, bob.reading.private_key()).unwrap(),
            secret
        );
    }
}

#[test]
fn tampered_ephemeral_key_fails() {
    let mut rng = StdRng::seed_from_u64(5);
    let bob = wallet(0x21);
    let secret = random_scalar(&mut rng);

    let mut ct = encrypt_secret(&secret, bob.reading.public_key(), &mut rng).unwrap();
    ct.packed_ephemeral[0] ^= 0x01;

    // Either the point no longer decodes or it decrypts to garbage
    match decrypt_secret(&ct, bob.reading.private_key()) {
        Ok(value) => assert_ne!(value, secret),
        Err(e) => assert!(matches!(
            e,
            PrivacyError::DecryptionIntegrity | PrivacyError::FieldRange(_)
        )),
    }
}

#[test]
fn signature_keys_are_stable() {
    let a = wallet(0x55);
    let b = wallet(0x55);
    assert_eq!(a.address(), b.address());
    assert_eq!(a.address().to_hex().len(), 128);
}

use proptest::prelude::*;

use secret_splitter::shamir::{
    combine, split, split_with, Diffuser, FieldElement, FieldModulus, ShamirError, Share, ShareKind,
};

fn share_texts(secret: &[u8], threshold: usize, count: usize, diffuser: Diffuser) -> Vec<String> {
    split(ShareKind::Message, secret, threshold, diffuser)
        .unwrap()
        .shares(count)
        .unwrap()
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn element(degree: u32) -> impl Strategy<Value = FieldElement> {
    let modulus = FieldModulus::new(degree).unwrap();
    prop::collection::vec(any::<u8>(), modulus.size_in_bytes())
        .prop_map(move |bytes| FieldElement::from_be_bytes(modulus, &bytes))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_threshold_subset_recovers(secret in prop::collection::vec(any::<u8>(), 1..=64)) {
        let shares = share_texts(&secret, 3, 5, Diffuser::Ssss);

        for a in 0..5 {
            for b in a + 1..5 {
                for c in b + 1..5 {
                    let subset = [&shares[a], &shares[b], &shares[c]];
                    let recovered = combine(&subset, Diffuser::Ssss).unwrap();
                    prop_assert_eq!(recovered.bytes(), &secret[..]);
                }
            }
        }
    }

    #[test]
    fn threshold_boundary(secret in prop::collection::vec(1u8..=255, 8..=32), threshold in 2usize..=6) {
        let shares = share_texts(&secret, threshold, threshold + 1, Diffuser::Xtea);

        let recovered = combine(&shares[..threshold], Diffuser::Xtea).unwrap();
        prop_assert_eq!(recovered.bytes(), &secret[..]);

        let recovered = combine(&shares[1..], Diffuser::Xtea).unwrap();
        prop_assert_eq!(recovered.bytes(), &secret[..]);

        let short = combine(&shares[..threshold - 1], Diffuser::Xtea).unwrap();
        prop_assert_ne!(short.bytes(), &secret[..]);
    }

    #[test]
    fn explicit_field_pads_secret(secret in prop::collection::vec(any::<u8>(), 1..=16)) {
        let modulus = FieldModulus::new(256).unwrap();
        let mut rng = rand::thread_rng();
        let shares: Vec<String> = split_with(ShareKind::Message, &secret, 2, Diffuser::Ssss, modulus, &mut rng)
            .unwrap()
            .shares(2)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();

        let recovered = combine(&shares, Diffuser::Ssss).unwrap();
        prop_assert_eq!(recovered.bytes().len(), 32);
        prop_assert_eq!(&recovered.bytes()[32 - secret.len()..], &secret[..]);
        prop_assert!(recovered.bytes()[..32 - secret.len()].iter().all(|&b| b == 0));
    }

    #[test]
    fn diffuser_is_a_bijection(block in prop::collection::vec(any::<u8>(), 8..=128)) {
        let scrambled = Diffuser::Xtea.scramble(&block).unwrap();
        prop_assert_eq!(scrambled.len(), block.len());
        prop_assert_eq!(Diffuser::Xtea.unscramble(&scrambled).unwrap(), block);
    }

    #[test]
    fn tampered_share_is_rejected(
        secret in prop::collection::vec(any::<u8>(), 1..=32),
        position in any::<prop::sample::Index>(),
        shift in 1u32..16,
    ) {
        let shares = share_texts(&secret, 2, 2, Diffuser::Ssss);

        // Change one character of the checksum, kind, index or y value
        let mut tampered = shares[1].clone();
        let digits: Vec<usize> = tampered
            .char_indices()
            .filter(|&(_, c)| c != '-')
            .map(|(at, _)| at)
            .collect();
        let at = digits[position.index(digits.len())];
        let in_index = tampered[..at].matches('-').count() == 1;

        let digit = tampered[at..].chars().next().unwrap().to_digit(16).unwrap();
        let replacement = if in_index {
            std::char::from_digit((digit + shift % 9 + 1) % 10, 10).unwrap()
        } else {
            std::char::from_digit((digit + shift) % 16, 16).unwrap()
        };
        tampered.replace_range(at..=at, &replacement.to_string());
        prop_assert_ne!(&tampered, &shares[1]);

        let parsed = Share::parse(&tampered).unwrap();
        let result = combine(&[shares[0].clone(), tampered.clone()], Diffuser::Ssss);

        if parsed.has_valid_checksum() {
            // One byte of checksum collides now and then
            prop_assert!(!matches!(result, Err(ShamirError::InvalidChecksumShare(_))));
        } else {
            let rejected = match result {
                Err(ShamirError::InvalidChecksumShare(ref s)) => *s == tampered,
                Err(ShamirError::InconsistentShares(_)) => true,
                _ => false,
            };
            prop_assert!(rejected, "{:?} was not rejected", tampered);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn field_identities_gf256(a in element(8), b in element(8), c in element(8)) {
        let zero = FieldElement::zero(a.modulus());
        let one = FieldElement::one(a.modulus());

        prop_assert_eq!(a.checked_add(&zero).unwrap(), a.clone());
        prop_assert_eq!(a.checked_mul(&one).unwrap(), a.clone());
        prop_assert!(a.checked_add(&a).unwrap().is_zero());
        prop_assert_eq!(a.checked_mul(&b).unwrap(), b.checked_mul(&a).unwrap());

        let left = a.checked_mul(&b.checked_add(&c).unwrap()).unwrap();
        let right = a.checked_mul(&b).unwrap().checked_add(&a.checked_mul(&c).unwrap()).unwrap();
        prop_assert_eq!(left, right);

        if !a.is_zero() {
            prop_assert!(a.checked_mul(&a.inverse().unwrap()).unwrap().is_one());
        }
    }

    #[test]
    fn field_identities_wide(a in element(200), b in element(200)) {
        let product = a.checked_mul(&b).unwrap();
        prop_assert_eq!(&product, &b.checked_mul(&a).unwrap());

        if !b.is_zero() {
            let back = product.checked_mul(&b.inverse().unwrap()).unwrap();
            prop_assert_eq!(back, a);
        }
    }
}

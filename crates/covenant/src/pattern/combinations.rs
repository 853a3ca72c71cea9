//! Bounded cartesian products for combinatorial generation.

/// Cartesian product of `choices`, capped at `max` combinations.
///
/// The first combination takes the first option of every slot and the last
/// combination takes the last option of every slot. Both extremes are always
/// kept, even when the cap truncates the middle of the enumeration.
pub fn capped_product<T: Clone>(choices: &[Vec<T>], max: usize) -> Vec<Vec<T>> {
    if choices.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let max = max.max(1);

    let mut combos: Vec<Vec<T>> = vec![Vec::with_capacity(choices.len())];
    for slot in choices {
        let mut next = Vec::with_capacity((combos.len() * slot.len()).min(max));
        'outer: for combo in &combos {
            for option in slot {
                if next.len() >= max {
                    break 'outer;
                }
                let mut extended = combo.clone();
                extended.push(option.clone());
                next.push(extended);
            }
        }
        combos = next;
    }

    let last: Vec<T> = choices.iter().filter_map(|slot| slot.last().cloned()).collect();
    let total: usize = choices
        .iter()
        .map(Vec::len)
        .try_fold(1usize, |acc, n| acc.checked_mul(n))
        .unwrap_or(usize::MAX);
    if total > combos.len() {
        if combos.len() >= max {
            combos.pop();
        }
        combos.push(last);
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_product_when_under_cap() {
        let combos = capped_product(&[vec![1, 2], vec![3, 4]], 10);
        assert_eq!(combos, vec![vec![1, 3], vec![1, 4], vec![2, 3], vec![2, 4]]);
    }

    #[test]
    fn test_cap_keeps_both_extremes() {
        let slots = vec![vec![true, false]; 10];
        let combos = capped_product(&slots, 5);
        assert_eq!(combos.len(), 5);
        assert_eq!(combos.first().unwrap(), &vec![true; 10]);
        assert_eq!(combos.last().unwrap(), &vec![false; 10]);
    }

    #[test]
    fn test_empty_slot_yields_nothing() {
        let combos: Vec<Vec<u8>> = capped_product(&[vec![1], vec![]], 10);
        assert!(combos.is_empty());
        // No slots at all is the single empty combination
        let combos: Vec<Vec<u8>> = capped_product(&[], 10);
        assert_eq!(combos, vec![Vec::<u8>::new()]);
    }
}

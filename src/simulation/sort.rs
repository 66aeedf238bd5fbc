use crate::floating_type_mod::FT;

/**
 * Sorts `values` ascending in place and applies every swap to `follower` as well,
 * so `follower[i]` still belongs to `values[i]` afterwards.
 *
 * Quicksort with the middle element as pivot.
 * Ties may end up in any order.
 */
pub fn sort_with_follower<T>(values: &mut [FT], follower: &mut [T]) {
    assert_eq!(
        values.len(),
        follower.len(),
        "sorted array and follower array need to have the same length"
    );

    if values.len() > 1 {
        quicksort_recursive(values, follower, 0, values.len() as isize - 1);
    }
}

fn quicksort_recursive<T>(values: &mut [FT], follower: &mut [T], lo: isize, hi: isize) {
    if lo >= hi {
        return;
    }

    let pivot = values[((lo + hi) / 2) as usize];

    let mut i = lo;
    let mut j = hi;

    while i <= j {
        while values[i as usize] < pivot {
            i += 1;
        }
        while values[j as usize] > pivot {
            j -= 1;
        }

        if i <= j {
            values.swap(i as usize, j as usize);
            follower.swap(i as usize, j as usize);
            i += 1;
            j -= 1;
        }
    }

    quicksort_recursive(values, follower, lo, j);
    quicksort_recursive(values, follower, i, hi);
}

//! Shared access to a finalized tree from several threads

use std::thread;

use field_layout::{Axis, Builder, Field, PaddingPolicy};

const THREADS: usize = 8;

#[test]
fn test_parallel_reads_and_disjoint_writes() {
    let mut builder = Builder::with_padding(PaddingPolicy::PowerOfTwoPad);
    let rows = builder.declare_node(builder.root(), &[Axis::I], &[THREADS as i64]).unwrap();
    let cells = builder.declare_node(rows, &[Axis::J], &[100]).unwrap();
    let input = Field::of::<u32>("input");
    let output = Field::of::<u64>("output");
    builder.place(cells, &[&input, &output]).unwrap();
    let tree = builder.finalize().unwrap();

    let values: Vec<u32> = (0..(THREADS * 100) as u32).collect();
    input.copy_from_slice(&values).unwrap();

    thread::scope(|scope| {
        for row in 0..THREADS {
            let (tree, input, output) = (&tree, &input, &output);
            scope.spawn(move || {
                for j in 0..100 {
                    let value = input.get::<u32>(&[row, j]).unwrap();
                    assert_eq!(value as usize, row * 100 + j);
                    assert!(tree.resolve(input, &[row, j]).unwrap() < tree.total_size());
                    // each thread owns one row of the output
                    output.set(&[row, j], u64::from(value) * 2).unwrap();
                }
            });
        }
    });

    let doubled = output.to_vec::<u64>().unwrap();
    assert_eq!(doubled.len(), THREADS * 100);
    for (index, value) in doubled.iter().enumerate() {
        assert_eq!(*value, index as u64 * 2);
    }
    // reading never disturbed the input
    assert_eq!(input.to_vec::<u32>().unwrap(), values);
}

#[test]
fn test_fields_move_between_threads() {
    let mut builder = Builder::new();
    let node = builder.declare_node(builder.root(), &[Axis::I], &[64]).unwrap();
    let x = Field::of::<f32>("x");
    builder.place(node, &[&x]).unwrap();
    let tree = builder.finalize().unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let x = x.clone();
            std::thread::spawn(move || {
                for i in (t..64).step_by(4) {
                    x.set(&[i], i as f32).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<f32> = (0..64).map(|i| i as f32).collect();
    assert_eq!(x.to_vec::<f32>().unwrap(), expected);
    tree.destroy().unwrap();
}

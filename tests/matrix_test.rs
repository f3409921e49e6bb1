use approx::assert_relative_eq;
use scnn::{Matrix, NetError};

fn sample() -> Matrix {
    // Columns [1, 2, 3] and [4, 5, 6].
    Matrix::from_array(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).unwrap()
}

fn counting(side: usize) -> Matrix {
    let values: Vec<f64> = (1..=side * side).map(|v| v as f64).collect();
    Matrix::from_array(&values, side).unwrap()
}

#[test]
fn test_multiply_then_divide_restores() {
    let m = sample();
    let back = m.multiply(3.7).multiply(1.0 / 3.7);
    for (a, b) in back.to_array().iter().zip(m.to_array().iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }
}

#[test]
fn test_involutions() {
    let m = sample();
    assert_eq!(m.transpose().transpose(), m);
    assert_eq!(m.rotate180().rotate180(), m);
    assert_eq!(m.transpose().shape(), (3, 2));
}

#[test]
fn test_array_round_trip() {
    let m = sample();
    assert_eq!(Matrix::from_array(&m.to_array(), m.col).unwrap(), m);
    assert_eq!(m.to_array(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_empty_array_round_trip() {
    let empty = Matrix::zeros(0, 0);
    assert_eq!(Matrix::from_array(&empty.to_array(), empty.col).unwrap(), empty);
    assert!(Matrix::from_array(&[1.0], 0).is_err());
}

#[test]
fn test_dot_shape_and_values() {
    // Rows of the mathematical matrix are [1, 3] and [2, 4].
    let a = Matrix::from_2d_array(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    let v = Matrix::from_array(&[1.0, 1.0], 1).unwrap();
    let res = a.dot(&v).unwrap();
    assert_eq!(res.shape(), (1, 2));
    assert_eq!(res.to_array(), vec![4.0, 6.0]);

    let bad = Matrix::zeros(1, 3);
    assert!(matches!(a.dot(&bad), Err(NetError::DimensionMismatch { .. })));
}

#[test]
fn test_elementwise_ops_need_equal_shapes() {
    let mut a = sample();
    let b = Matrix::zeros(3, 2);
    assert!(a.hadamard(&b).is_err());
    assert!(a.add(&b).is_err());

    let twice = sample().multiply(2.0);
    a.add(&sample()).unwrap();
    assert_eq!(a, twice);
    assert_eq!(sample().hadamard(&sample()).unwrap().to_array()[5], 36.0);
}

#[test]
fn test_correlation_shape_law() {
    let m = counting(5);
    let k = Matrix::zeros(3, 3);
    assert_eq!(m.correlation(&k).unwrap().shape(), (3, 3));
    assert_eq!(m.full_correlation(&k).unwrap().shape(), (7, 7));
}

#[test]
fn test_correlation_values() {
    let m = counting(3);
    let ones = Matrix::from_array(&[1.0; 4], 2).unwrap();
    let res = m.correlation(&ones).unwrap();
    assert_eq!(res.data[0][0], 1.0 + 2.0 + 4.0 + 5.0);
    assert_eq!(res.data[1][1], 5.0 + 6.0 + 8.0 + 9.0);

    let full = m.full_correlation(&ones).unwrap();
    assert_eq!(full.data[0][0], 1.0);
    assert_eq!(full.data[3][3], 9.0);
}

#[test]
fn test_correlation_rejects_oversized_kernel() {
    let m = counting(2);
    let k = Matrix::zeros(3, 3);
    assert!(matches!(m.correlation(&k), Err(NetError::DimensionMismatch { .. })));
}

#[test]
fn test_vector_helpers() {
    let v1 = Matrix::from_array(&[1.0, 2.0], 1).unwrap();
    let v2 = Matrix::from_array(&[3.0], 1).unwrap();
    let joined = Matrix::concat_vectors(&v1, &v2).unwrap();
    assert_eq!(joined.to_array(), vec![1.0, 2.0, 3.0]);
    assert!(Matrix::concat_vectors(&sample(), &v2).is_err());

    assert_eq!(joined.slice_vector(1, 3).unwrap().to_array(), vec![2.0, 3.0]);
    assert!(joined.slice_vector(2, 1).is_err());
    assert!(joined.slice_vector(0, 4).is_err());

    let m = sample();
    let flat = m.vectorize();
    assert_eq!(flat.shape(), (1, 6));
    assert_eq!(flat.matrixize(2).unwrap(), m);
}

#[test]
fn test_ragged_columns_are_rejected() {
    assert!(Matrix::from_2d_array(vec![vec![1.0], vec![2.0, 3.0]]).is_err());
}

use na::{Matrix3, Matrix4, Vector3, Vector4};
use ndarray as nd;
extern crate nalgebra as na;
pub type Vector3d = Vector3<f64>;
pub type Vector4d = Vector4<f64>;
pub type Matrix3d = Matrix3<f64>;
pub type Matrix4d = Matrix4<f64>;
pub type UnitQuaterniond = na::UnitQuaternion<f64>;
pub fn vec_from_array_d(vertices: &nd::Array2<f64>, row_index: usize) -> Vector3d {
    let row = vertices.row(row_index);
    Vector3d::new(row[0], row[1], row[2])
}
pub fn vec_from_view_d(row: &nd::ArrayView1<f64>) -> Vector3d {
    Vector3d::new(row[0], row[1], row[2])
}
pub fn set_row_from_vec_d(vertices: &mut nd::Array2<f64>, row_index: usize, v: &Vector3d) {
    let mut row = vertices.row_mut(row_index);
    row[0] = v.x;
    row[1] = v.y;
    row[2] = v.z;
}
pub fn array_from_vecs_d(vecs: &[Vector3d]) -> nd::Array2<f64> {
    let mut arr = nd::Array2::<f64>::zeros((vecs.len(), 3));
    for (i, v) in vecs.iter().enumerate() {
        set_row_from_vec_d(&mut arr, i, v);
    }
    arr
}
/// Quaternion as ``[x, y, z, w]``, the layout glTF and most hosts key on
pub fn quat_to_xyzw(q: &UnitQuaterniond) -> Vector4d {
    Vector4d::new(q.i, q.j, q.k, q.w)
}
pub fn quat_from_xyzw(v: &Vector4d) -> UnitQuaterniond {
    UnitQuaterniond::new_normalize(na::Quaternion::new(v[3], v[0], v[1], v[2]))
}
pub fn all_finite_d(v: &Vector3d) -> bool {
    v.iter().all(|x| x.is_finite())
}

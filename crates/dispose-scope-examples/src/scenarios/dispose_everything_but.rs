use dispose_scope_native::Tensor;

use super::{open, tensor_err};

pub fn run() -> Result<(), String> {
    let scope = open("pipeline")?;
    let input = Tensor::full(&[8], 2.0);
    let squared = input.mul(&input).map_err(tensor_err)?;
    let shifted = squared.sub(&input).map_err(tensor_err)?;
    let total = shifted.sum().map_err(tensor_err)?;
    println!("{} owns {} tensors before cleanup", scope.id(), scope.disposables_count());

    scope.dispose_everything_but(&[&input, &total]);
    println!("{} owns {} tensors after cleanup", scope.id(), scope.disposables_count());
    println!("total = {:?}", total.to_vec().map_err(tensor_err)?);
    if squared.to_vec().is_ok() {
        return Err("intermediate survived dispose_everything_but".to_owned());
    }
    Ok(())
}

use dispose_scope::Disposable;
use dispose_scope_native::Tensor;

use super::{open, tensor_err};

pub fn run() -> Result<(), String> {
    let a = open("a")?;
    let x = Tensor::ones(&[2]);
    let y = Tensor::full(&[2], 3.0);
    println!("{} owns {} tensors", a.id(), a.disposables_count());

    let z = {
        let b = open("b")?;
        let z = x.add(&y).map_err(tensor_err)?;
        println!("{} owns {} tensor", b.id(), b.disposables_count());
        let z = b.move_to_outer(z);
        println!(
            "moved {} to {:?}; {} now owns {}",
            z.id(),
            z.scope_link().owner_id(),
            b.id(),
            b.disposables_count()
        );
        z
    };

    let values = z.to_vec().map_err(tensor_err)?;
    println!(
        "{} owns {} tensors after the inner scope ended; z = {values:?}",
        a.id(),
        a.disposables_count()
    );
    a.end();
    println!("outer scope ended; z released: {}", z.is_released());
    Ok(())
}

use dispose_scope::Disposable;
use dispose_scope_native::Tensor;

use super::{open, tensor_err};

const LEARNING_RATE: f32 = 0.1;

/// Fits `w * x ≈ target` elementwise, releasing each step's intermediates.
pub fn run(iterations: u32) -> Result<(), String> {
    let session = open("session")?;
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[4]).map_err(tensor_err)?;
    let target = Tensor::from_vec(vec![2.0, 4.0, 6.0, 8.0], &[4]).map_err(tensor_err)?;
    let mut weights = Tensor::ones(&[4]);

    for step in 0..iterations {
        let next = {
            let iteration = open("step")?;
            let prediction = weights.mul(&x).map_err(tensor_err)?;
            let error = prediction.sub(&target).map_err(tensor_err)?;
            let loss = error.mul(&error).map_err(tensor_err)?.sum().map_err(tensor_err)?;
            let gradient = error
                .mul(&x)
                .map_err(tensor_err)?
                .scale(2.0 * LEARNING_RATE / 4.0)
                .map_err(tensor_err)?;
            let next = weights.sub(&gradient).map_err(tensor_err)?;

            let loss = loss.to_vec().map_err(tensor_err)?;
            println!(
                "step {step}: loss = {:.4}, tensors in step scope = {}",
                loss.first().copied().unwrap_or_default(),
                iteration.disposables_count()
            );
            iteration.move_to_outer(next)
        };
        weights.dispose();
        weights = next;
    }

    println!("weights = {:?}", weights.to_vec().map_err(tensor_err)?);
    println!("{} owns {} tensors at the end", session.id(), session.disposables_count());
    debug_assert!(weights.scope_link().owner_id() == Some(session.id()));
    Ok(())
}

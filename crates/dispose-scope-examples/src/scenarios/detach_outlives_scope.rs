use dispose_scope::Disposable;
use dispose_scope_native::Tensor;

use super::{open, tensor_err};

pub fn run() -> Result<(), String> {
    let cache = {
        let scope = open("load")?;
        let _scratch = Tensor::zeros(&[16]);
        let cache = Tensor::full(&[4], 0.5);
        println!("{} owns {} tensors", scope.id(), scope.disposables_count());
        let cache = scope.detach(cache);
        println!("detached {}; tracked: {}", cache.id(), cache.scope_link().is_tracked());
        cache
    };

    println!("cache survived its scope: {:?}", cache.to_vec().map_err(tensor_err)?);
    cache.dispose();
    println!("cache released by its owner: {}", cache.is_released());
    Ok(())
}

//! The ancillary product-perm table: prefix-matched against
//! `uevent.product`, applying ownership to `/dev/<device_name>`. Grounded on
//! `init/devices.c`'s `dev_id[]`/`fixup_device_perms`, which does the same
//! linear prefix scan over a fixed-size array; here it is a plain `Vec`.

#[derive(Debug, Clone)]
pub struct ProductPermEntry {
    pub product_prefix: String,
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl ProductPermEntry {
    pub fn new(product_prefix: impl Into<String>, uid: u32, gid: u32, mode: u32) -> Self {
        Self {
            product_prefix: product_prefix.into(),
            uid,
            gid,
            mode,
        }
    }

    pub fn matches(&self, product: &str) -> bool {
        product.starts_with(self.product_prefix.as_str())
    }
}

//! Generates a key pair for the controller and prints both halves as base64.

use lockbox_controller::KeyPair;

fn main() {
    let keypair = KeyPair::generate();
    println!("public:  {}", keypair.public.to_base64());
    println!("private: {}", keypair.private.to_base64());
}

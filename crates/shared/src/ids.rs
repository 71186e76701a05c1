use rand::RngCore;

/// Opaque room identifier handed out by the server.
pub type RoomId = String;

/// Identifier supplied by the identity provider for hosts and members.
pub type ParticipantId = String;

/// Generate an opaque room id: 16 random bytes, hex encoded.
pub fn gen_room_id() -> RoomId {
    let mut bytes = [0u8; 16];
    let mut rng = rand::rng();
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

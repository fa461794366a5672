use crate::constant::CapabilityFlags;
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

// ============================================================================
// Initial Handshake Packet (Server -> Client)
// ============================================================================

/// Initial handshake packet from server (Protocol::HandshakeV10)
///
/// This is the first packet sent by MySQL server after TCP connection.
/// Server sends its capabilities, auth plugin name, and challenge data.
///
/// Packet format:
/// ```text
/// 1   [0a] protocol version (always 10)
/// n   server version (null-terminated string)
/// 4   connection id
/// 8   auth-plugin-data-part-1 (first 8 bytes of challenge)
/// 1   [00] filler
/// 2   capability flags (lower 2 bytes)
/// 1   character set
/// 2   status flags
/// 2   capability flags (upper 2 bytes)
/// 1   auth plugin data length
/// 10  reserved (all 0x00)
/// n   auth-plugin-data-part-2 (remaining challenge bytes)
/// n   auth plugin name (null-terminated)
/// ```
#[derive(Debug, Clone)]
pub struct InitialHandshake<'a> {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin_data: Vec<u8>,
    pub capability_flags: CapabilityFlags,
    pub charset: u8,
    pub status_flags: u16,
    pub auth_plugin_name: &'a [u8],
}

/// Read initial handshake packet from server
pub fn read_initial_handshake(payload: &[u8]) -> Result<InitialHandshake<'_>> {
    let (protocol_version, mut data) = read_int_1(payload)?;

    // If first byte from server is 0xFF, Packet is an ERR_Packet, socket has to be closed.
    if protocol_version == 0xFF {
        let err = ErrPayload::try_from(ErrPayloadBytes(payload))?;
        return Err(Error::from(err));
    }

    let (server_version_bytes, rest) = read_string_null(data)?;
    let server_version = String::from_utf8_lossy(server_version_bytes).to_string();
    data = rest;

    let (connection_id, rest) = read_int_4(data)?;
    data = rest;

    // auth-plugin-data-part-1 (8 bytes)
    let (auth_data_1, rest) = read_string_fix(data, 8)?;
    data = rest;

    // filler (1 byte)
    let (_filler, rest) = read_int_1(data)?;
    data = rest;

    // capability flags (lower 2 bytes)
    let (cap_lower, rest) = read_int_2(data)?;
    data = rest;

    // charset (1 byte)
    let (charset, rest) = read_int_1(data)?;
    data = rest;

    // status flags (2 bytes)
    let (status_flags, rest) = read_int_2(data)?;
    data = rest;

    // capability flags (upper 2 bytes)
    let (cap_upper, rest) = read_int_2(data)?;
    data = rest;

    let cap_bits = ((cap_upper as u32) << 16) | (cap_lower as u32);
    let capability_flags = CapabilityFlags::from_bits_truncate(cap_bits);

    // auth plugin data length (1 byte)
    let (auth_data_len, rest) = read_int_1(data)?;
    data = rest;

    // reserved (10 bytes)
    let (_reserved, rest) = read_string_fix(data, 10)?;
    data = rest;

    // auth-plugin-data-part-2
    let auth_data_2_len = (auth_data_len as usize).saturating_sub(9).max(12);
    let (auth_data_2, rest) = read_string_fix(data, auth_data_2_len)?;
    data = rest;
    let (_reserved, rest) = read_int_1(data)?;
    data = rest;

    // Combine auth plugin data
    let mut auth_plugin_data = Vec::new();
    auth_plugin_data.extend_from_slice(auth_data_1);
    auth_plugin_data.extend_from_slice(auth_data_2);

    // auth plugin name (null-terminated)
    let (auth_plugin_name, rest) = read_string_null(data)?;

    if !rest.is_empty() {
        return Err(Error::InvalidPacket);
    }

    Ok(InitialHandshake {
        protocol_version,
        server_version,
        connection_id,
        auth_plugin_data,
        capability_flags,
        charset,
        status_flags,
        auth_plugin_name,
    })
}

// ============================================================================
// Handshake Response Packet (Client -> Server)
// ============================================================================

/// Handshake response packet sent by client (HandshakeResponse41)
///
/// This is sent in response to the initial handshake from server.
/// Contains client capabilities, username, and authentication response.
///
/// Packet format (without SSL):
/// ```text
/// 4   capability flags
/// 4   max packet size
/// 1   character set
/// 23  reserved (all 0x00)
/// n   username (null-terminated string)
/// n   auth response length + data (length-encoded if CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA)
/// n   database name (null-terminated, if CLIENT_CONNECT_WITH_DB)
/// n   auth plugin name (null-terminated, if CLIENT_PLUGIN_AUTH)
/// ```
#[derive(Debug, Clone)]
pub struct HandshakeResponse41<'a> {
    pub capability_flags: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    pub username: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin_name: Option<&'a str>,
}

/// Write handshake response packet (HandshakeResponse41)
///
/// This writes the client's response to the initial handshake.
/// The auth_response should be pre-computed using the appropriate auth plugin.
pub fn write_handshake_response(out: &mut Vec<u8>, response: &HandshakeResponse41) {
    // capability flags (4 bytes)
    write_int_4(out, response.capability_flags.bits());

    // max packet size (4 bytes)
    write_int_4(out, response.max_packet_size);

    // charset (1 byte)
    write_int_1(out, response.charset);

    // reserved (23 bytes of 0x00)
    out.extend_from_slice(&[0u8; 23]);

    // username (null-terminated)
    write_string_null(out, response.username);

    // auth response
    if response
        .capability_flags
        .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA)
    {
        // length-encoded auth response (modern protocol)
        write_bytes_lenenc(out, response.auth_response);
    } else {
        // 1-byte length + data (older protocol)
        write_int_1(out, response.auth_response.len() as u8);
        out.extend_from_slice(response.auth_response);
    }

    // database name (null-terminated, if CLIENT_CONNECT_WITH_DB)
    if let Some(db) = response.database {
        write_string_null(out, db);
    }

    // auth plugin name (null-terminated, if CLIENT_PLUGIN_AUTH)
    if let Some(plugin) = response.auth_plugin_name
        && response
            .capability_flags
            .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH)
    {
        write_string_null(out, plugin);
    }

    // TODO: CLIENT_CONNECT_ATTRS

    // TODO: CLIENT_ZSTD_COMPRESSION_ALGORITHM
    // if response.capability_flags.contains(CapabilityFlags::CLIENT_ZSTD_COMPRESSION_ALGORITHM) {
    //     write_int_1(out, compression_level);
    // }
}

// ============================================================================
// Auth Switch Request Packet (Server -> Client)
// ============================================================================

/// Auth switch request from server
///
/// Server sends this when it wants to use a different authentication method
/// than was specified in the initial handshake.
///
/// Packet format:
/// ```text
/// 1   [fe] status (0xFE for auth switch)
/// n   plugin name (null-terminated)
/// n   plugin data (challenge data for the new plugin)
/// ```
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest<'a> {
    pub plugin_name: &'a [u8],
    pub plugin_data: &'a [u8],
}

/// Read auth switch request (0xFE with length >= 9)
pub fn read_auth_switch_request(payload: &[u8]) -> Result<AuthSwitchRequest<'_>> {
    let (header, mut data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }

    let (plugin_name, rest) = read_string_null(data)?;
    data = rest;

    if let Some(0) = data.last() {
        Ok(AuthSwitchRequest {
            plugin_name,
            plugin_data: &data[..data.len() - 1],
        })
    } else {
        Err(Error::InvalidPacket)
    }
}

/// Write auth switch response
///
/// Client sends the authentication data computed using the requested plugin.
pub fn write_auth_switch_response(out: &mut Vec<u8>, auth_data: &[u8]) {
    out.extend_from_slice(auth_data);
}

// ============================================================================
// Authentication Plugins
// ============================================================================

/// mysql_native_password authentication
///
/// This is the traditional MySQL authentication method using SHA1.
/// Formula: SHA1(password) XOR SHA1(challenge + SHA1(SHA1(password)))
///
/// # Arguments
/// * `password` - Plain text password
/// * `challenge` - 20-byte challenge from server (auth_plugin_data)
///
/// # Returns
/// 20-byte authentication response
pub fn auth_mysql_native_password(password: &str, challenge: &[u8]) -> [u8; 20] {
    use sha1::{Digest, Sha1};

    if password.is_empty() {
        return [0u8; 20];
    }

    // stage1_hash = SHA1(password)
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    let stage1_hash = hasher.finalize();

    // stage2_hash = SHA1(stage1_hash)
    let mut hasher = Sha1::new();
    hasher.update(stage1_hash);
    let stage2_hash = hasher.finalize();

    // token_hash = SHA1(challenge + stage2_hash)
    let mut hasher = Sha1::new();
    hasher.update(challenge);
    hasher.update(stage2_hash);
    let token_hash = hasher.finalize();

    // result = stage1_hash XOR token_hash
    let mut result = [0u8; 20];
    for i in 0..20 {
        result[i] = stage1_hash[i] ^ token_hash[i];
    }

    result
}

/// caching_sha2_password authentication - initial response
///
/// This is the default authentication method in MySQL 8.0+.
/// Uses SHA256 hashing instead of SHA1.
/// Formula: XOR(SHA256(password), SHA256(SHA256(SHA256(password)), challenge))
///
/// # Arguments
/// * `password` - Plain text password
/// * `challenge` - 20-byte challenge from server (auth_plugin_data)
///
/// # Returns
/// 32-byte authentication response
pub fn auth_caching_sha2_password(password: &str, challenge: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    if password.is_empty() {
        return [0u8; 32];
    }

    // stage1 = SHA256(password)
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    let stage1 = hasher.finalize();

    // stage2 = SHA256(stage1)
    let mut hasher = Sha256::new();
    hasher.update(stage1);
    let stage2 = hasher.finalize();

    // scramble = SHA256(stage2 + challenge)
    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(challenge);
    let scramble = hasher.finalize();

    // result = stage1 XOR scramble
    let mut result = [0u8; 32];
    for i in 0..32 {
        result[i] = stage1[i] ^ scramble[i];
    }

    result
}

/// caching_sha2_password fast auth result
///
/// After sending the initial auth response, server may respond with:
/// - 0x03 (fast auth success) - cached authentication succeeded
/// - 0x04 (full auth required) - need to send password via RSA or cleartext
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachingSha2PasswordFastAuthResult {
    Success,
    FullAuthRequired,
}

/// Read caching_sha2_password fast auth result
pub fn read_caching_sha2_password_fast_auth_result(
    payload: &[u8],
) -> Result<CachingSha2PasswordFastAuthResult> {
    if payload.is_empty() {
        return Err(Error::UnexpectedEof);
    }

    match payload[0] {
        0x03 => Ok(CachingSha2PasswordFastAuthResult::Success),
        0x04 => Ok(CachingSha2PasswordFastAuthResult::FullAuthRequired),
        _ => Err(Error::InvalidPacket),
    }
}

/// XOR the (NUL-terminated) password against the repeating nonce, as used by
/// both `caching_sha2_password`'s full-auth-over-plaintext path under TLS and
/// the scramble step before RSA encryption when no TLS channel is present.
fn xor_password_with_nonce(password: &str, nonce: &[u8]) -> Vec<u8> {
    let mut buf = password.as_bytes().to_vec();
    buf.push(0);
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= nonce[i % nonce.len()];
    }
    buf
}

/// Encrypt the password for `caching_sha2_password` full authentication over
/// a plaintext channel, using the server's RSA public key (PEM-encoded, as
/// returned by a `0x02` "public key request").
///
/// Formula: `RSA_OAEP_Encrypt(pubkey, password_nul XOR nonce)`, where `nonce`
/// is the original handshake challenge truncated/cycled to the password
/// length, per the `caching_sha2_password` plugin's full-auth specification.
pub fn encrypt_password_with_rsa_public_key(
    password: &str,
    nonce: &[u8],
    public_key_pem: &str,
) -> Result<Vec<u8>> {
    use rand::rngs::OsRng;
    use rsa::Oaep;
    use rsa::pkcs8::DecodePublicKey;
    use sha1::Sha1;

    let public_key = rsa::RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| Error::AuthError(format!("invalid RSA public key from server: {e}")))?;

    let xored = xor_password_with_nonce(password, nonce);

    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha1>(), &xored)
        .map_err(|e| Error::AuthError(format!("RSA encryption failed: {e}")))
}

/// Plaintext password response for `caching_sha2_password` full auth when the
/// channel is already encrypted (TLS) or for `mysql_clear_password`.
pub fn cleartext_password_response(password: &str) -> Vec<u8> {
    let mut buf = password.as_bytes().to_vec();
    buf.push(0);
    buf
}

// ============================================================================
// Handshake state machine
// ============================================================================

/// Configuration used to drive a [`Handshake`].
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub client_capabilities: CapabilityFlags,
    pub charset: u8,
    pub max_packet_size: u32,
    pub tls_active: bool,
}

impl HandshakeConfig {
    pub fn new(username: String, password: String, database: Option<String>) -> Self {
        Self {
            username,
            password,
            database,
            client_capabilities: crate::constant::CAPABILITIES_ALWAYS_ENABLED,
            charset: 45,
            max_packet_size: 0xFFFFFF,
            tls_active: false,
        }
    }
}

/// Outcome of feeding a server packet into [`Handshake::drive`].
pub enum HandshakeResult {
    /// Write `packet_data` to the server, then read the next packet and call
    /// `drive` again. An empty `packet_data` means "no write needed, just
    /// read the next packet" (used while waiting on RSA public key replies).
    Write(Vec<u8>),
    /// Authentication succeeded.
    Connected {
        server_version: String,
        capability_flags: CapabilityFlags,
        connection_id: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthPlugin {
    MysqlNativePassword,
    CachingSha2Password,
}

impl AuthPlugin {
    fn from_name(name: &[u8]) -> Result<Self> {
        match name {
            b"mysql_native_password" => Ok(Self::MysqlNativePassword),
            b"caching_sha2_password" => Ok(Self::CachingSha2Password),
            other => Err(Error::Unsupported(format!(
                "auth plugin {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    fn compute_response(&self, password: &str, challenge: &[u8]) -> Vec<u8> {
        match self {
            Self::MysqlNativePassword => auth_mysql_native_password(password, challenge).to_vec(),
            Self::CachingSha2Password => auth_caching_sha2_password(password, challenge).to_vec(),
        }
    }
}

enum State {
    AwaitingInitialHandshake,
    AwaitingAuthResult {
        plugin: AuthPlugin,
        challenge: Vec<u8>,
        server_version: String,
        connection_id: u32,
        capability_flags: CapabilityFlags,
    },
    /// Sent a `0x02` request for the server's RSA public key; awaiting it.
    AwaitingPublicKey {
        challenge: Vec<u8>,
        server_version: String,
        connection_id: u32,
        capability_flags: CapabilityFlags,
    },
    Done,
}

/// Drives the connect-time handshake: reads the server's initial handshake,
/// negotiates capabilities, computes and sends the authentication response,
/// and follows auth-switch/full-auth branches through to completion.
pub struct Handshake {
    config: HandshakeConfig,
    state: State,
}

impl Handshake {
    pub fn new(username: String, password: String, database: Option<String>) -> Self {
        Self {
            config: HandshakeConfig::new(username, password, database),
            state: State::AwaitingInitialHandshake,
        }
    }

    pub fn with_config(config: HandshakeConfig) -> Self {
        Self {
            config,
            state: State::AwaitingInitialHandshake,
        }
    }

    fn client_capabilities(&self, server_capabilities: CapabilityFlags) -> CapabilityFlags {
        let mut caps = self.config.client_capabilities & server_capabilities;
        if self.config.database.is_some() {
            caps |= CapabilityFlags::CLIENT_CONNECT_WITH_DB;
        }
        caps |= CapabilityFlags::CLIENT_PLUGIN_AUTH;
        caps
    }

    fn handshake_response_packet(
        &self,
        capability_flags: CapabilityFlags,
        plugin_name: &str,
        auth_response: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        write_handshake_response(
            &mut out,
            &HandshakeResponse41 {
                capability_flags,
                max_packet_size: self.config.max_packet_size,
                charset: self.config.charset,
                username: &self.config.username,
                auth_response,
                database: self.config.database.as_deref(),
                auth_plugin_name: Some(plugin_name),
            },
        );
        out
    }

    /// Feed the next packet read from the server into the state machine.
    pub fn drive(&mut self, payload: &[u8]) -> Result<HandshakeResult> {
        match std::mem::replace(&mut self.state, State::Done) {
            State::AwaitingInitialHandshake => {
                let handshake = read_initial_handshake(payload)?;
                let capability_flags = self.client_capabilities(handshake.capability_flags);
                let plugin = AuthPlugin::from_name(handshake.auth_plugin_name)?;
                let response =
                    plugin.compute_response(&self.config.password, &handshake.auth_plugin_data);
                let plugin_name = match plugin {
                    AuthPlugin::MysqlNativePassword => "mysql_native_password",
                    AuthPlugin::CachingSha2Password => "caching_sha2_password",
                };

                let packet =
                    self.handshake_response_packet(capability_flags, plugin_name, &response);

                self.state = State::AwaitingAuthResult {
                    plugin,
                    challenge: handshake.auth_plugin_data,
                    server_version: handshake.server_version,
                    connection_id: handshake.connection_id,
                    capability_flags,
                };
                Ok(HandshakeResult::Write(packet))
            }

            State::AwaitingAuthResult {
                plugin,
                challenge,
                server_version,
                connection_id,
                capability_flags,
            } => {
                if payload.first() == Some(&0xFF) {
                    let err = ErrPayload::try_from(ErrPayloadBytes(payload))?;
                    return Err(Error::from(err));
                }

                // OK packet: authentication succeeded immediately.
                if payload.first() == Some(&0x00) {
                    return Ok(HandshakeResult::Connected {
                        server_version,
                        capability_flags,
                        connection_id,
                    });
                }

                // Auth switch request: server wants a different plugin.
                if payload.first() == Some(&0xFE) && payload.len() > 1 {
                    let switch = read_auth_switch_request(payload)?;
                    let new_plugin = AuthPlugin::from_name(switch.plugin_name)?;
                    let response = new_plugin
                        .compute_response(&self.config.password, switch.plugin_data);
                    let mut packet = Vec::new();
                    write_auth_switch_response(&mut packet, &response);

                    self.state = State::AwaitingAuthResult {
                        plugin: new_plugin,
                        challenge: switch.plugin_data.to_vec(),
                        server_version,
                        connection_id,
                        capability_flags,
                    };
                    return Ok(HandshakeResult::Write(packet));
                }

                // caching_sha2_password fast/full-auth indicator (0x01 header).
                if plugin == AuthPlugin::CachingSha2Password && payload.first() == Some(&0x01) {
                    match read_caching_sha2_password_fast_auth_result(&payload[1..])? {
                        CachingSha2PasswordFastAuthResult::Success => {
                            self.state = State::AwaitingAuthResult {
                                plugin,
                                challenge,
                                server_version,
                                connection_id,
                                capability_flags,
                            };
                            // Next packet must be the final OK; request it with an empty write.
                            return Ok(HandshakeResult::Write(Vec::new()));
                        }
                        CachingSha2PasswordFastAuthResult::FullAuthRequired => {
                            if self.config.tls_active {
                                let packet = cleartext_password_response(&self.config.password);
                                self.state = State::AwaitingAuthResult {
                                    plugin,
                                    challenge,
                                    server_version,
                                    connection_id,
                                    capability_flags,
                                };
                                return Ok(HandshakeResult::Write(packet));
                            }
                            // Request the server's RSA public key (0x02).
                            self.state = State::AwaitingPublicKey {
                                challenge,
                                server_version,
                                connection_id,
                                capability_flags,
                            };
                            return Ok(HandshakeResult::Write(vec![0x02]));
                        }
                    }
                }

                Err(Error::ProtocolError(format!(
                    "unexpected packet during authentication: 0x{:02X}",
                    payload.first().copied().unwrap_or(0)
                )))
            }

            State::AwaitingPublicKey {
                challenge,
                server_version,
                connection_id,
                capability_flags,
            } => {
                if payload.first() == Some(&0xFF) {
                    let err = ErrPayload::try_from(ErrPayloadBytes(payload))?;
                    return Err(Error::from(err));
                }

                let public_key_pem = String::from_utf8(payload.to_vec())
                    .map_err(|_| Error::ProtocolError("RSA public key is not UTF-8".into()))?;

                let encrypted = encrypt_password_with_rsa_public_key(
                    &self.config.password,
                    &challenge,
                    &public_key_pem,
                )?;

                self.state = State::AwaitingAuthResult {
                    plugin: AuthPlugin::CachingSha2Password,
                    challenge,
                    server_version,
                    connection_id,
                    capability_flags,
                };
                Ok(HandshakeResult::Write(encrypted))
            }

            State::Done => Err(Error::ProtocolError(
                "handshake driven after completion".into(),
            )),
        }
    }
}

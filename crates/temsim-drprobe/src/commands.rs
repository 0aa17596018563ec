//! Dr. Probe backend running the `celslc`, `msa` and `wavimg` programs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::backend::{BackendError, BackendInfo, SimulationBackend, SliceRequest};

/// Backend that shells out to the Dr. Probe command-line programs.
///
/// Each call blocks until the child process exits; there is no timeout.
pub struct DrProbeBackend {
    bin_dir: Option<PathBuf>,
    verbose: bool,
}

impl DrProbeBackend {
    /// Use the programs found on `PATH`.
    pub fn new() -> Self {
        Self { bin_dir: None, verbose: true }
    }

    /// Use the programs in a specific directory.
    pub fn with_bin_dir(dir: impl Into<PathBuf>) -> Self {
        Self { bin_dir: Some(dir.into()), verbose: true }
    }

    /// Whether the programs' console output is shown.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn program(&self, name: &str) -> PathBuf {
        match &self.bin_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    fn run(&self, name: &str, args: Vec<OsString>) -> Result<(), BackendError> {
        let program = self.program(name);
        log::debug!("Running {} {:?}", program.display(), args);

        let mut command = Command::new(&program);
        command.args(&args);
        if !self.verbose {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = command.status().map_err(|source| BackendError::Spawn {
            program: program.display().to_string(),
            source,
        })?;
        if !status.success() {
            return Err(BackendError::CommandFailed {
                program: name.to_string(),
                status,
            });
        }
        Ok(())
    }

    pub(crate) fn celslc_args(request: &SliceRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-cel".into(),
            request.structure.clone().into(),
            "-slc".into(),
            request.output_prefix.clone().into(),
            "-ht".into(),
            request.high_tension.to_string().into(),
            "-nx".into(),
            request.nx.to_string().into(),
            "-ny".into(),
            request.ny.to_string().into(),
            "-nz".into(),
            request.nz.to_string().into(),
        ];
        if request.absorptive {
            args.push("-abs".into());
        }
        if request.debye_waller {
            args.push("-dwf".into());
            args.push("-buni".into());
            args.push(request.biso.to_string().into());
        }
        args
    }

    pub(crate) fn msa_args(&self, msa_prm: &Path, wave_out: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-prm".into(),
            msa_prm.as_os_str().to_owned(),
            "-out".into(),
            wave_out.as_os_str().to_owned(),
            "/ctem".into(),
        ];
        if !self.verbose {
            args.push("/silent".into());
        }
        args
    }

    pub(crate) fn wavimg_args(&self, wavimg_prm: &Path, image_out: &Path, defocus_nm: f64) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-prm".into(),
            wavimg_prm.as_os_str().to_owned(),
            "-out".into(),
            image_out.as_os_str().to_owned(),
            "-foc".into(),
            defocus_nm.to_string().into(),
        ];
        if !self.verbose {
            args.push("/sil".into());
        }
        args
    }
}

impl Default for DrProbeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationBackend for DrProbeBackend {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: "Dr. Probe (celslc, msa, wavimg)".into(),
            location: self.bin_dir.clone(),
        }
    }

    fn slice(&self, request: &SliceRequest) -> Result<(), BackendError> {
        self.run("celslc", Self::celslc_args(request))
    }

    fn propagate(&self, msa_prm: &Path, wave_out: &Path) -> Result<(), BackendError> {
        self.run("msa", self.msa_args(msa_prm, wave_out))
    }

    fn form_image(
        &self,
        wavimg_prm: &Path,
        image_out: &Path,
        defocus_nm: f64,
    ) -> Result<(), BackendError> {
        self.run("wavimg", self.wavimg_args(wavimg_prm, image_out, defocus_nm))?;
        if !image_out.exists() {
            return Err(BackendError::MissingOutput(image_out.to_path_buf()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SliceRequest {
        SliceRequest {
            structure: PathBuf::from("out/foo/cel/foo.cel"),
            output_prefix: PathBuf::from("out/foo/slc/foo_slc"),
            high_tension: 300.0,
            nx: 512,
            ny: 512,
            nz: 300,
            absorptive: true,
            debye_waller: true,
            biso: 0.005,
        }
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_celslc_arguments() {
        let args = strings(&DrProbeBackend::celslc_args(&request()));
        assert_eq!(
            args,
            vec![
                "-cel", "out/foo/cel/foo.cel", "-slc", "out/foo/slc/foo_slc", "-ht", "300",
                "-nx", "512", "-ny", "512", "-nz", "300", "-abs", "-dwf", "-buni", "0.005",
            ]
        );
    }

    #[test]
    fn test_celslc_without_corrections() {
        let req = SliceRequest { absorptive: false, debye_waller: false, ..request() };
        let args = strings(&DrProbeBackend::celslc_args(&req));
        assert!(!args.iter().any(|a| a == "-abs" || a == "-dwf" || a == "-buni"));
    }

    #[test]
    fn test_silent_flags_follow_verbosity() {
        let quiet = DrProbeBackend::new().verbose(false);
        assert!(!quiet.is_verbose());
        let loud = DrProbeBackend::new();

        let msa = strings(&quiet.msa_args(Path::new("a.prm"), Path::new("wav/a")));
        assert_eq!(msa, vec!["-prm", "a.prm", "-out", "wav/a", "/ctem", "/silent"]);
        assert!(!strings(&loud.msa_args(Path::new("a.prm"), Path::new("wav/a")))
            .contains(&"/silent".to_string()));

        let img = strings(&quiet.wavimg_args(Path::new("w.prm"), Path::new("img/a.dat"), 8.0));
        assert_eq!(img, vec!["-prm", "w.prm", "-out", "img/a.dat", "-foc", "8", "/sil"]);
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = DrProbeBackend::with_bin_dir(dir.path()).verbose(false);
        let err = backend.slice(&request()).unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
        assert_eq!(backend.info().location.as_deref(), Some(dir.path()));
    }
}

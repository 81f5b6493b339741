//! Butcher tableaux of the explicit Runge-Kutta methods.
//!
//! References:
//!  [1] Hairer E, Nørsett SP, Wanner G (1993). Solving Ordinary Differential Equations I:
//!      Nonstiff Problems. Springer Series in Computational Mathematics, Vol. 8
//!  [2] Fehlberg E (1968). Classical fifth-, sixth-, seventh-, and eighth-order Runge-Kutta
//!      formulas with stepsize control. NASA TR R-287
use crate::numerical::ODE::ode_config::OdeMethod;

/// (A, B, C) coefficients plus the embedded pair, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Tableau {
    pub method: OdeMethod,
    /// nstg x nstg, strictly lower triangular
    pub a: Vec<Vec<f64>>,
    pub b: Vec<f64>,
    pub be: Option<Vec<f64>>,
    /// error weights E = B - Be
    pub e: Option<Vec<f64>>,
    pub c: Vec<f64>,
    /// order of the propagated solution
    pub p: usize,
    /// order of the embedded solution; 0 if there is none
    pub q: usize,
    /// first stage of a step equals last stage of the previous one
    pub fsal: bool,
    /// continuous extension available
    pub dense: bool,
    /// weights of the 3rd order estimate of DOP853: (stage, coefficient)
    pub bhh: Option<[(usize, f64); 3]>,
}

impl Tableau {
    pub fn nstages(&self) -> usize {
        self.c.len()
    }

    pub fn embedded(&self) -> bool {
        self.e.is_some()
    }

    /// order q of the error estimate; the step size controller uses h^(1/(q+1))
    pub fn error_order(&self) -> usize {
        if self.bhh.is_some() {
            // DOP853 combined estimate
            7
        } else {
            self.p.min(self.q)
        }
    }
}

/// square matrix from the rows below the diagonal (first row empty)
fn square(rows: &[&[f64]]) -> Vec<Vec<f64>> {
    let n = rows.len();
    rows.iter()
        .map(|row| {
            let mut full = vec![0.0; n];
            full[..row.len()].copy_from_slice(row);
            full
        })
        .collect()
}

fn difference(b: &[f64], be: &[f64]) -> Vec<f64> {
    b.iter().zip(be.iter()).map(|(bi, bei)| bi - bei).collect()
}

#[allow(clippy::too_many_arguments)]
fn build(
    method: OdeMethod,
    rows: &[&[f64]],
    b: &[f64],
    be: Option<&[f64]>,
    c: &[f64],
    p: usize,
    q: usize,
    fsal: bool,
) -> Tableau {
    Tableau {
        method,
        a: square(rows),
        b: b.to_vec(),
        be: be.map(|be| be.to_vec()),
        e: be.map(|be| difference(b, be)),
        c: c.to_vec(),
        p,
        q,
        fsal,
        dense: false,
        bhh: None,
    }
}

/// tableau of an explicit method; None for implicit ones
pub fn tableau(method: OdeMethod) -> Option<Tableau> {
    use OdeMethod::*;
    let t = match method {
        FwEuler => build(method, &[&[]], &[1.0], None, &[0.0], 1, 0, false),
        MoEuler => build(
            method,
            &[&[], &[1.0]],
            &[0.5, 0.5],
            Some(&[1.0, 0.0]),
            &[0.0, 1.0],
            2,
            1,
            false,
        ),
        Rk2 => build(method, &[&[], &[0.5]], &[0.0, 1.0], None, &[0.0, 0.5], 2, 0, false),
        Rk3 => build(
            method,
            &[&[], &[0.5], &[-1.0, 2.0]],
            &[1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
            None,
            &[0.0, 0.5, 1.0],
            3,
            0,
            false,
        ),
        Heun3 => build(
            method,
            &[&[], &[1.0 / 3.0], &[0.0, 2.0 / 3.0]],
            &[0.25, 0.0, 0.75],
            None,
            &[0.0, 1.0 / 3.0, 2.0 / 3.0],
            3,
            0,
            false,
        ),
        Rk4 => build(
            method,
            &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
            &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
            None,
            &[0.0, 0.5, 0.5, 1.0],
            4,
            0,
            false,
        ),
        Rk4_38 => build(
            method,
            &[
                &[],
                &[1.0 / 3.0],
                &[-1.0 / 3.0, 1.0],
                &[1.0, -1.0, 1.0],
            ],
            &[1.0 / 8.0, 3.0 / 8.0, 3.0 / 8.0, 1.0 / 8.0],
            None,
            &[0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0],
            4,
            0,
            false,
        ),
        Merson4 => build(
            method,
            &[
                &[],
                &[1.0 / 3.0],
                &[1.0 / 6.0, 1.0 / 6.0],
                &[1.0 / 8.0, 0.0, 3.0 / 8.0],
                &[1.0 / 2.0, 0.0, -3.0 / 2.0, 2.0],
            ],
            &[1.0 / 6.0, 0.0, 0.0, 2.0 / 3.0, 1.0 / 6.0],
            Some(&[1.0 / 10.0, 0.0, 3.0 / 10.0, 2.0 / 5.0, 1.0 / 5.0]),
            &[0.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 2.0, 1.0],
            4,
            3,
            false,
        ),
        Zonneveld4 => build(
            method,
            &[
                &[],
                &[1.0 / 2.0],
                &[0.0, 1.0 / 2.0],
                &[0.0, 0.0, 1.0],
                &[5.0 / 32.0, 7.0 / 32.0, 13.0 / 32.0, -1.0 / 32.0],
            ],
            &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0, 0.0],
            Some(&[-1.0 / 2.0, 7.0 / 3.0, 7.0 / 3.0, 13.0 / 6.0, -16.0 / 3.0]),
            &[0.0, 1.0 / 2.0, 1.0 / 2.0, 1.0, 3.0 / 4.0],
            4,
            3,
            false,
        ),
        Fehlberg4 => build(
            method,
            &[
                &[],
                &[1.0 / 4.0],
                &[3.0 / 32.0, 9.0 / 32.0],
                &[1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0],
                &[439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0],
                &[-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
            ],
            &[25.0 / 216.0, 0.0, 1408.0 / 2565.0, 2197.0 / 4104.0, -1.0 / 5.0, 0.0],
            Some(&[
                16.0 / 135.0,
                0.0,
                6656.0 / 12825.0,
                28561.0 / 56430.0,
                -9.0 / 50.0,
                2.0 / 55.0,
            ]),
            &[0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0],
            4,
            5,
            false,
        ),
        Dopri5 => dopri5(),
        Verner6 => build(
            method,
            &[
                &[],
                &[1.0 / 6.0],
                &[4.0 / 75.0, 16.0 / 75.0],
                &[5.0 / 6.0, -8.0 / 3.0, 5.0 / 2.0],
                &[-165.0 / 64.0, 55.0 / 6.0, -425.0 / 64.0, 85.0 / 96.0],
                &[12.0 / 5.0, -8.0, 4015.0 / 612.0, -11.0 / 36.0, 88.0 / 255.0],
                &[
                    -8263.0 / 15000.0,
                    124.0 / 75.0,
                    -643.0 / 680.0,
                    -81.0 / 250.0,
                    2484.0 / 10625.0,
                    0.0,
                ],
                &[
                    3501.0 / 1720.0,
                    -300.0 / 43.0,
                    297275.0 / 52632.0,
                    -319.0 / 2322.0,
                    24068.0 / 84065.0,
                    0.0,
                    3850.0 / 26703.0,
                ],
            ],
            &[
                3.0 / 40.0,
                0.0,
                875.0 / 2244.0,
                23.0 / 72.0,
                264.0 / 1955.0,
                0.0,
                125.0 / 11592.0,
                43.0 / 616.0,
            ],
            Some(&[
                13.0 / 160.0,
                0.0,
                2375.0 / 5984.0,
                5.0 / 16.0,
                12.0 / 85.0,
                3.0 / 44.0,
                0.0,
                0.0,
            ]),
            &[0.0, 1.0 / 6.0, 4.0 / 15.0, 2.0 / 3.0, 5.0 / 6.0, 1.0, 1.0 / 15.0, 1.0],
            6,
            5,
            false,
        ),
        Fehlberg7 => fehlberg7(),
        Dopri8 => dopri8(),
        BwEuler | Radau5 => return None,
    };
    Some(t)
}

fn dopri5() -> Tableau {
    let mut t = build(
        OdeMethod::Dopri5,
        &[
            &[],
            &[1.0 / 5.0],
            &[3.0 / 40.0, 9.0 / 40.0],
            &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
            &[19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0],
            &[
                9017.0 / 3168.0,
                -355.0 / 33.0,
                46732.0 / 5247.0,
                49.0 / 176.0,
                -5103.0 / 18656.0,
            ],
            &[
                35.0 / 384.0,
                0.0,
                500.0 / 1113.0,
                125.0 / 192.0,
                -2187.0 / 6784.0,
                11.0 / 84.0,
            ],
        ],
        &[
            35.0 / 384.0,
            0.0,
            500.0 / 1113.0,
            125.0 / 192.0,
            -2187.0 / 6784.0,
            11.0 / 84.0,
            0.0,
        ],
        Some(&[
            5179.0 / 57600.0,
            0.0,
            7571.0 / 16695.0,
            393.0 / 640.0,
            -92097.0 / 339200.0,
            187.0 / 2100.0,
            1.0 / 40.0,
        ]),
        &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
        5,
        4,
        true,
    );
    // error weights as published in [1]
    t.e = Some(vec![
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ]);
    t.dense = true;
    t
}

fn fehlberg7() -> Tableau {
    build(
        OdeMethod::Fehlberg7,
        &[
            &[],
            &[2.0 / 27.0],
            &[1.0 / 36.0, 1.0 / 12.0],
            &[1.0 / 24.0, 0.0, 1.0 / 8.0],
            &[5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0],
            &[1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0],
            &[-25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0],
            &[31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0],
            &[2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0],
            &[
                -91.0 / 108.0,
                0.0,
                0.0,
                23.0 / 108.0,
                -976.0 / 135.0,
                311.0 / 54.0,
                -19.0 / 60.0,
                17.0 / 6.0,
                -1.0 / 12.0,
            ],
            &[
                2383.0 / 4100.0,
                0.0,
                0.0,
                -341.0 / 164.0,
                4496.0 / 1025.0,
                -301.0 / 82.0,
                2133.0 / 4100.0,
                45.0 / 82.0,
                45.0 / 164.0,
                18.0 / 41.0,
            ],
            &[
                3.0 / 205.0,
                0.0,
                0.0,
                0.0,
                0.0,
                -6.0 / 41.0,
                -3.0 / 205.0,
                -3.0 / 41.0,
                3.0 / 41.0,
                6.0 / 41.0,
                0.0,
            ],
            &[
                -1777.0 / 4100.0,
                0.0,
                0.0,
                -341.0 / 164.0,
                4496.0 / 1025.0,
                -289.0 / 82.0,
                2193.0 / 4100.0,
                51.0 / 82.0,
                33.0 / 164.0,
                12.0 / 41.0,
                0.0,
                1.0,
            ],
        ],
        &[
            41.0 / 840.0,
            0.0,
            0.0,
            0.0,
            0.0,
            34.0 / 105.0,
            9.0 / 35.0,
            9.0 / 35.0,
            9.0 / 280.0,
            9.0 / 280.0,
            41.0 / 840.0,
            0.0,
            0.0,
        ],
        Some(&[
            0.0,
            0.0,
            0.0,
            0.0,
            0.0,
            34.0 / 105.0,
            9.0 / 35.0,
            9.0 / 35.0,
            9.0 / 280.0,
            9.0 / 280.0,
            0.0,
            41.0 / 840.0,
            41.0 / 840.0,
        ]),
        &[
            0.0,
            2.0 / 27.0,
            1.0 / 9.0,
            1.0 / 6.0,
            5.0 / 12.0,
            1.0 / 2.0,
            5.0 / 6.0,
            1.0 / 6.0,
            2.0 / 3.0,
            1.0 / 3.0,
            1.0,
            0.0,
            1.0,
        ],
        7,
        8,
        false,
    )
}

// DOP853 coefficients
const C2: f64 = 0.526001519587677318785587544488e-01;
const C3: f64 = 0.789002279381515978178381316732e-01;
const C4: f64 = 0.118350341907227396726757197510e+00;
const C5: f64 = 0.281649658092772603273242802490e+00;
const C6: f64 = 0.333333333333333333333333333333e+00;
const C7: f64 = 0.25e+00;
const C8: f64 = 0.307692307692307692307692307692e+00;
const C9: f64 = 0.651282051282051282051282051282e+00;
const C10: f64 = 0.6e+00;
const C11: f64 = 0.857142857142857142857142857142e+00;

fn dopri8() -> Tableau {
    let b = vec![
        5.42937341165687622380535766363e-2,
        0.0,
        0.0,
        0.0,
        0.0,
        4.45031289275240888144113950566e0,
        1.89151789931450038304281599044e0,
        -5.8012039600105847814672114227e0,
        3.1116436695781989440891606237e-1,
        -1.52160949662516078556178806805e-1,
        2.01365400804030348374776537501e-1,
        4.47106157277725905176885569043e-2,
    ];
    let e = vec![
        0.1312004499419488073250102996e-01,
        0.0,
        0.0,
        0.0,
        0.0,
        -0.1225156446376204440720569753e+01,
        -0.4957589496572501915214079952e+00,
        0.1664377182454986536961530415e+01,
        -0.3503288487499736816886487290e+00,
        0.3341791187130174790297318841e+00,
        0.8192320648511571246570742613e-01,
        -0.2235530786388629525884427845e-01,
    ];
    let rows: [&[f64]; 12] = [
        &[],
        &[5.26001519587677318785587544488e-2],
        &[1.97250569845378994544595329183e-2, 5.91751709536136983633785987549e-2],
        &[2.95875854768068491816892993775e-2, 0.0, 8.87627564304205475450678981324e-2],
        &[
            2.41365134159266685502369798665e-1,
            0.0,
            -8.84549479328286085344864962717e-1,
            9.24834003261792003115737966543e-1,
        ],
        &[
            3.7037037037037037037037037037e-2,
            0.0,
            0.0,
            1.70828608729473871279604482173e-1,
            1.25467687566822425016691814123e-1,
        ],
        &[
            3.7109375e-2,
            0.0,
            0.0,
            1.70252211019544039314978060272e-1,
            6.02165389804559606850219397283e-2,
            -1.7578125e-2,
        ],
        &[
            3.70920001185047927108779319836e-2,
            0.0,
            0.0,
            1.70383925712239993810214054705e-1,
            1.07262030446373284651809199168e-1,
            -1.53194377486244017527936158236e-2,
            8.27378916381402288758473766002e-3,
        ],
        &[
            6.24110958716075717114429577812e-1,
            0.0,
            0.0,
            -3.36089262944694129406857109825e0,
            -8.68219346841726006818189891453e-1,
            2.75920996994467083049415600797e1,
            2.01540675504778934086186788979e1,
            -4.34898841810699588477366255144e1,
        ],
        &[
            4.77662536438264365890433908527e-1,
            0.0,
            0.0,
            -2.48811461997166764192642586468e0,
            -5.90290826836842996371446475743e-1,
            2.12300514481811942347288949897e1,
            1.52792336328824235832596922938e1,
            -3.32882109689848629194453265587e1,
            -2.03312017085086261358222928593e-2,
        ],
        &[
            -9.3714243008598732571704021658e-1,
            0.0,
            0.0,
            5.18637242884406370830023853209e0,
            1.09143734899672957818500254654e0,
            -8.14978701074692612513997267357e0,
            -1.85200656599969598641566180701e1,
            2.27394870993505042818970056734e1,
            2.49360555267965238987089396762e0,
            -3.0467644718982195003823669022e0,
        ],
        &[
            2.27331014751653820792359768449e0,
            0.0,
            0.0,
            -1.05344954667372501984066689879e1,
            -2.00087205822486249909675718444e0,
            -1.79589318631187989172765950534e1,
            2.79488845294199600508499808837e1,
            -2.85899827713502369474065508674e0,
            -8.87285693353062954433549289258e0,
            1.23605671757943030647266201528e1,
            6.43392746015763530355970484046e-1,
        ],
    ];
    Tableau {
        method: OdeMethod::Dopri8,
        a: square(&rows),
        b,
        be: None,
        e: Some(e),
        c: vec![0.0, C2, C3, C4, C5, C6, C7, C8, C9, C10, C11, 1.0],
        p: 8,
        q: 5,
        fsal: false,
        dense: false,
        bhh: Some([
            (0, 0.244094488188976377952755905512e+00),
            (8, 0.733846688281611857341361741547e+00),
            (11, 0.220588235294117647058823529412e-01),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    fn explicit_tableaux() -> Vec<Tableau> {
        OdeMethod::iter().filter_map(tableau).collect()
    }

    #[test]
    fn test_dimensions() {
        let all = explicit_tableaux();
        assert_eq!(all.len(), 14);
        for t in all {
            let n = t.nstages();
            assert_eq!(t.a.len(), n, "{}", t.method);
            assert!(t.a.iter().all(|row| row.len() == n));
            assert_eq!(t.b.len(), n);
            if let Some(e) = &t.e {
                assert_eq!(e.len(), n);
            }
            if let Some(be) = &t.be {
                assert_eq!(be.len(), n);
            }
            // strictly lower triangular
            for i in 0..n {
                for j in i..n {
                    assert_eq!(t.a[i][j], 0.0);
                }
            }
        }
        assert!(tableau(OdeMethod::Radau5).is_none());
        assert!(tableau(OdeMethod::BwEuler).is_none());
    }

    #[test]
    fn test_c_equals_row_sums_of_a() {
        for t in explicit_tableaux() {
            let tol = if t.nstages() > 10 { 1e-14 } else { 1e-15 };
            for i in 0..t.nstages() {
                let sum: f64 = t.a[i].iter().sum();
                assert_relative_eq!(sum, t.c[i], epsilon = tol);
            }
        }
    }

    #[test]
    fn test_error_weights() {
        for t in explicit_tableaux() {
            if let (Some(e), Some(be)) = (&t.e, &t.be) {
                for i in 0..t.nstages() {
                    assert_relative_eq!(e[i], t.b[i] - be[i], epsilon = 1e-15);
                }
            }
            // the error weights of a consistent pair sum up to zero
            if let Some(e) = &t.e {
                let sum: f64 = e.iter().sum();
                assert_relative_eq!(sum, 0.0, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_order_conditions() {
        for t in explicit_tableaux() {
            let n = t.nstages();
            let tol = if n > 10 { 1e-14 } else { 1e-15 };
            for p in 1..=t.p {
                let sum: f64 = (0..n).map(|i| t.b[i] * t.c[i].powi(p as i32 - 1)).sum();
                assert_relative_eq!(sum, 1.0 / p as f64, epsilon = tol);
            }
            if t.p < 3 {
                continue;
            }
            let (mut sbac, mut sbcac, mut sbac2, mut sbaac) = (0.0, 0.0, 0.0, 0.0);
            for i in 0..n {
                for j in 0..n {
                    sbac += t.b[i] * t.a[i][j] * t.c[j];
                    sbcac += t.b[i] * t.c[i] * t.a[i][j] * t.c[j];
                    sbac2 += t.b[i] * t.a[i][j] * t.c[j] * t.c[j];
                    for k in 0..n {
                        sbaac += t.b[i] * t.a[i][j] * t.a[j][k] * t.c[k];
                    }
                }
            }
            assert_relative_eq!(sbac, 1.0 / 6.0, epsilon = tol);
            if t.p < 4 {
                continue;
            }
            assert_relative_eq!(sbcac, 1.0 / 8.0, epsilon = tol);
            assert_relative_eq!(sbac2, 1.0 / 12.0, epsilon = tol);
            assert_relative_eq!(sbaac, 1.0 / 24.0, epsilon = tol);
        }
    }

    #[test]
    fn test_flags() {
        let dopri5 = tableau(OdeMethod::Dopri5).unwrap();
        assert!(dopri5.fsal && dopri5.dense && dopri5.embedded());
        assert_eq!(dopri5.error_order(), 4);
        // last stage of DOPRI5 is evaluated at the new state
        assert_eq!(dopri5.a[6][..6], dopri5.b[..6]);
        let rk4 = tableau(OdeMethod::Rk4).unwrap();
        assert!(!rk4.embedded());
        let dopri8 = tableau(OdeMethod::Dopri8).unwrap();
        assert_eq!(dopri8.nstages(), 12);
        assert_eq!(dopri8.error_order(), 7);
        assert_eq!(tableau(OdeMethod::Fehlberg7).unwrap().nstages(), 13);
    }
}
